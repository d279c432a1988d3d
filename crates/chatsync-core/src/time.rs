//! Millisecond clock abstraction and the sliding-window check.
//!
//! Timestamps are milliseconds since the Unix epoch, the unit the hub uses
//! for writing-activity events.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tokio::time::Instant;

/// Returns `true` when `timestamp_ms` lies within the last `window_ms`
/// milliseconds relative to `now_ms` (inclusive at the boundary).
pub fn is_within(timestamp_ms: i64, window_ms: i64, now_ms: i64) -> bool {
    timestamp_ms >= now_ms.saturating_sub(window_ms)
}

/// Source of "now" for time-windowed derivations.
pub trait Clock: Send + Sync + fmt::Debug + 'static {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Wall clock backed by [`chrono::Utc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for deterministic tests and replays.
///
/// Clones share the same underlying instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at `start_ms`.
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Jump to an absolute instant.
    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Clock that follows the tokio timer from a wall-clock origin.
///
/// Advances with `tokio::time`, so a paused test runtime moves it together
/// with sleeps and timers.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeClock {
    origin_ms: i64,
    origin: Instant,
}

impl RuntimeClock {
    /// Anchor at the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now().timestamp_millis())
    }

    /// Anchor at `origin_ms`.
    pub fn starting_at(origin_ms: i64) -> Self {
        Self {
            origin_ms,
            origin: Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RuntimeClock {
    fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.origin_ms.saturating_add(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_boundaries() {
        let now = 1_000_000;
        assert!(is_within(now - 9_000, 10_000, now));
        assert!(is_within(now - 10_000, 10_000, now));
        assert!(!is_within(now - 11_000, 10_000, now));
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(500);
        let other = clock.clone();
        clock.advance(250);
        assert_eq!(other.now_ms(), 750);
        other.set(42);
        assert_eq!(clock.now_ms(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_clock_follows_paused_timer() {
        let clock = RuntimeClock::starting_at(10_000);
        tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;
        assert_eq!(clock.now_ms(), 11_500);
    }
}
