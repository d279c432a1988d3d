//! Outbound writing state of the local user in one conversation.
//!
//! A pure state machine over explicit `now_ms` values; the
//! [`WritingBroadcaster`](super::broadcaster::WritingBroadcaster) drives it
//! from input commands and its trailing timer.

use chatsync_core::config::WritingConfig;
use chatsync_core::model::WritingActivity;

/// Debounce state for one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalWritingState {
    /// Minimum gap between two `IsWriting` broadcasts while writing.
    broadcast_threshold_ms: i64,
    /// Idle time after which the trailing stop fires.
    stop_after_ms: i64,
    /// Current local activity; `None` before any input.
    activity: Option<WritingActivity>,
    /// When `IsWriting` was last broadcast.
    last_writing_broadcast_ms: Option<i64>,
    /// When the trailing stop fires.
    deadline_ms: Option<i64>,
}

impl LocalWritingState {
    pub fn new(config: &WritingConfig) -> Self {
        Self {
            broadcast_threshold_ms: config.broadcast_threshold_ms,
            stop_after_ms: config.stale_after_ms,
            activity: None,
            last_writing_broadcast_ms: None,
            deadline_ms: None,
        }
    }

    /// Apply one input change. Returns the activity to broadcast, if any.
    ///
    /// Empty input stops immediately and disarms the trailing timer.
    /// Non-empty input re-arms the timer and broadcasts `IsWriting` only
    /// when not already writing or when the last notice is older than the
    /// broadcast threshold.
    pub fn on_input(&mut self, text: &str, now_ms: i64) -> Option<WritingActivity> {
        if text.is_empty() {
            self.stop();
            return Some(WritingActivity::StoppedWriting);
        }

        let was_writing = self.activity == Some(WritingActivity::IsWriting);
        self.activity = Some(WritingActivity::IsWriting);
        self.deadline_ms = Some(now_ms.saturating_add(self.stop_after_ms));

        let notice_expired = self
            .last_writing_broadcast_ms
            .is_none_or(|last| now_ms - last > self.broadcast_threshold_ms);

        if !was_writing || notice_expired {
            self.last_writing_broadcast_ms = Some(now_ms);
            Some(WritingActivity::IsWriting)
        } else {
            None
        }
    }

    /// Fire the trailing timer if it is due.
    pub fn on_deadline(&mut self, now_ms: i64) -> Option<WritingActivity> {
        match self.deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.stop();
                Some(WritingActivity::StoppedWriting)
            }
            _ => None,
        }
    }

    /// When the trailing stop is due, if armed.
    pub fn deadline_ms(&self) -> Option<i64> {
        self.deadline_ms
    }

    /// Current local activity.
    pub fn activity(&self) -> Option<WritingActivity> {
        self.activity
    }

    fn stop(&mut self) {
        self.activity = Some(WritingActivity::StoppedWriting);
        self.deadline_ms = None;
        self.last_writing_broadcast_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WritingActivity::*;

    fn state() -> LocalWritingState {
        LocalWritingState::new(&WritingConfig::default())
    }

    #[test]
    fn test_keystrokes_while_writing_broadcast_once() {
        let mut state = state();
        let broadcasts: Vec<_> = (0..10)
            .filter_map(|i| state.on_input("hello", 1_000 + i * 100))
            .collect();
        assert_eq!(broadcasts, vec![IsWriting]);
    }

    #[test]
    fn test_long_typing_renews_notice_after_threshold() {
        let mut state = state();
        assert_eq!(state.on_input("a", 0), Some(IsWriting));
        assert_eq!(state.on_input("ab", 9_000), None);
        assert_eq!(state.on_input("abc", 10_000), None);
        assert_eq!(state.on_input("abcd", 10_001), Some(IsWriting));
    }

    #[test]
    fn test_trailing_stop_fires_once_after_last_keystroke() {
        let mut state = state();
        state.on_input("a", 0);
        state.on_input("ab", 4_000);

        assert_eq!(state.on_deadline(13_999), None);
        assert_eq!(state.on_deadline(14_000), Some(StoppedWriting));
        assert_eq!(state.on_deadline(20_000), None);
        assert_eq!(state.deadline_ms(), None);
    }

    #[test]
    fn test_empty_input_stops_and_disarms_timer() {
        let mut state = state();
        state.on_input("a", 0);
        assert_eq!(state.on_input("", 500), Some(StoppedWriting));
        assert_eq!(state.deadline_ms(), None);
        assert_eq!(state.on_deadline(60_000), None);

        // Writing again after a stop is a fresh notice.
        assert_eq!(state.on_input("b", 600), Some(IsWriting));
    }
}
