//! Sync engine metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// Successful initial handshakes
    pub connects: AtomicU64,
    /// Successful automatic reconnects
    pub reconnects: AtomicU64,
    /// Connections that ended after retries ran out
    pub terminal_disconnects: AtomicU64,
    /// Pushes received from the hub
    pub pushes_received: AtomicU64,
    /// Writing-activity broadcasts sent
    pub writing_broadcasts: AtomicU64,
    /// Group listen announcements sent
    pub announcements: AtomicU64,
    /// Notifications suppressed as already displayed
    pub notifications_deduplicated: AtomicU64,
}

impl SyncMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an initial handshake.
    pub fn connected(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an automatic reconnect.
    pub fn reconnected(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a terminal disconnect.
    pub fn terminally_disconnected(&self) {
        self.terminal_disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a received push.
    pub fn push_received(&self) {
        self.pushes_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a writing-activity broadcast.
    pub fn writing_broadcast(&self) {
        self.writing_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a group announcement.
    pub fn announced(&self) {
        self.announcements.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a suppressed notification.
    pub fn notification_deduplicated(&self) {
        self.notifications_deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            terminal_disconnects: self.terminal_disconnects.load(Ordering::Relaxed),
            pushes_received: self.pushes_received.load(Ordering::Relaxed),
            writing_broadcasts: self.writing_broadcasts.load(Ordering::Relaxed),
            announcements: self.announcements.load(Ordering::Relaxed),
            notifications_deduplicated: self.notifications_deduplicated.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Successful initial handshakes
    pub connects: u64,
    /// Successful automatic reconnects
    pub reconnects: u64,
    /// Connections that ended after retries ran out
    pub terminal_disconnects: u64,
    /// Pushes received from the hub
    pub pushes_received: u64,
    /// Writing-activity broadcasts sent
    pub writing_broadcasts: u64,
    /// Group listen announcements sent
    pub announcements: u64,
    /// Notifications suppressed as already displayed
    pub notifications_deduplicated: u64,
}
