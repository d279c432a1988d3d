//! Set of notifications already shown to the user.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Deduplication key
type DedupKey = String;

/// Keys remembered before the oldest are evicted.
pub const DEFAULT_CAPACITY: usize = 4_096;

#[derive(Debug, Default)]
struct Displayed {
    keys: HashSet<DedupKey>,
    /// Insertion order, oldest first.
    order: VecDeque<DedupKey>,
}

/// Displayed-notification set: each key is shown at most once.
///
/// Owned by the dispatcher and cleared when the engine stops, so a new
/// session starts with an empty set. Holds at most `capacity` keys; the
/// oldest key is forgotten first.
#[derive(Debug)]
pub struct DisplayedNotifications {
    capacity: usize,
    displayed: Mutex<Displayed>,
}

impl Default for DisplayedNotifications {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DisplayedNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set remembering at most `capacity` keys (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            displayed: Mutex::new(Displayed::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Displayed> {
        self.displayed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `key` as displayed.
    ///
    /// Returns `true` if it should be shown, `false` if it already was.
    pub fn mark_displayed(&self, key: &str) -> bool {
        let mut displayed = self.lock();
        if displayed.keys.contains(key) {
            return false;
        }
        while displayed.order.len() >= self.capacity {
            if let Some(oldest) = displayed.order.pop_front() {
                displayed.keys.remove(&oldest);
            }
        }
        displayed.keys.insert(key.to_string());
        displayed.order.push_back(key.to_string());
        true
    }

    /// Whether `key` was displayed.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().keys.contains(key)
    }

    /// Build a dedup key from event components
    pub fn make_key(kind: &str, resource_id: &str) -> String {
        format!("{}:{}", kind, resource_id)
    }

    pub fn len(&self) -> usize {
        self.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything
    pub fn clear(&self) {
        let mut displayed = self.lock();
        displayed.keys.clear();
        displayed.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_displayed_once() {
        let displayed = DisplayedNotifications::new();
        let key = DisplayedNotifications::make_key("message", "42");
        assert_eq!(key, "message:42");

        assert!(displayed.mark_displayed(&key));
        assert!(!displayed.mark_displayed(&key));
        assert!(displayed.contains(&key));

        displayed.clear();
        assert!(displayed.is_empty());
        assert!(displayed.mark_displayed(&key));
    }

    #[test]
    fn test_oldest_key_evicted_at_capacity() {
        let displayed = DisplayedNotifications::with_capacity(2);
        assert!(displayed.mark_displayed("message:1"));
        assert!(displayed.mark_displayed("message:2"));
        assert!(displayed.mark_displayed("message:3"));

        assert_eq!(displayed.len(), 2);
        assert!(!displayed.contains("message:1"));
        assert!(!displayed.mark_displayed("message:3"));
    }
}
