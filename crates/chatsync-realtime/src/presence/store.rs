//! Presence store: last known status per user.

use std::collections::HashMap;

use dashmap::DashMap;

use chatsync_core::model::PresenceStatus;
use chatsync_core::types::id::UserId;

/// Status per user. Records never expire.
#[derive(Debug, Default)]
pub struct PresenceStore {
    statuses: DashMap<UserId, PresenceStatus>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user's status. Returns `false` when it was already `status`.
    pub fn set(&self, user_id: UserId, status: PresenceStatus) -> bool {
        match self.statuses.insert(user_id, status) {
            Some(previous) => previous != status,
            None => true,
        }
    }

    /// Status of a user; unknown users are `Offline`.
    pub fn status_of(&self, user_id: &UserId) -> PresenceStatus {
        self.statuses
            .get(user_id)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    /// Whether a record exists for the user.
    pub fn contains(&self, user_id: &UserId) -> bool {
        self.statuses.contains_key(user_id)
    }

    /// Copy of every record.
    pub fn snapshot(&self) -> HashMap<UserId, PresenceStatus> {
        self.statuses
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.statuses.clear();
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_reports_changes_only() {
        let store = PresenceStore::new();
        let user = UserId::new();

        assert!(store.set(user, PresenceStatus::Online));
        assert!(!store.set(user, PresenceStatus::Online));
        assert!(store.set(user, PresenceStatus::Inactive));
        assert_eq!(store.status_of(&user), PresenceStatus::Inactive);
    }

    #[test]
    fn test_unknown_user_is_offline() {
        let store = PresenceStore::new();
        assert_eq!(store.status_of(&UserId::new()), PresenceStatus::Offline);
        assert!(store.is_empty());
    }
}
