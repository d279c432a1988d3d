//! Writing-activity timing configuration.

use serde::{Deserialize, Serialize};

/// Timing knobs for the writing-activity aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WritingConfig {
    /// Minimum gap between two consecutive `IsWriting` broadcasts while the
    /// user keeps typing, and the idle time after which the local state
    /// falls back to `StoppedWriting`.
    #[serde(default = "default_threshold")]
    pub broadcast_threshold_ms: i64,
    /// Records older than this are hidden from the "is writing" display.
    #[serde(default = "default_stale_after")]
    pub stale_after_ms: i64,
    /// Interval of the display re-derivation poll.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for WritingConfig {
    fn default() -> Self {
        Self {
            broadcast_threshold_ms: default_threshold(),
            stale_after_ms: default_stale_after(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_threshold() -> i64 {
    10_000
}

fn default_stale_after() -> i64 {
    10_000
}

fn default_poll_interval() -> u64 {
    500
}
