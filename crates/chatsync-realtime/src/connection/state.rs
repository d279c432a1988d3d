//! Connection status state machine.

use serde::{Deserialize, Serialize};

use chatsync_core::types::id::ConnectionId;

/// Status of the single hub connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No connection and no recovery in progress.
    #[default]
    Disconnected,
    /// Initial handshake in flight.
    Connecting,
    /// Live connection.
    Connected,
    /// Transport dropped; automatic recovery in progress.
    Reconnecting,
}

impl ConnectionStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// A dropped transport always passes through `Reconnecting`; there is
    /// no direct `Connected -> Connected` edge.
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Reconnecting)
                | (Connected, Disconnected)
                | (Reconnecting, Connected)
                | (Reconnecting, Disconnected)
        )
    }

    /// Converts to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

/// Immutable snapshot of the connection, published on every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    /// Id of the live connection; `None` unless `Connected`.
    pub connection_id: Option<ConnectionId>,
    /// Current status.
    pub status: ConnectionStatus,
    /// Whether the current `Connected` state came from automatic recovery.
    pub is_reconnected: bool,
}

impl ConnectionState {
    /// Fresh `Connecting` state.
    pub fn connecting() -> Self {
        Self {
            connection_id: None,
            status: ConnectionStatus::Connecting,
            is_reconnected: false,
        }
    }

    /// Live state for a successful handshake.
    pub fn connected(connection_id: ConnectionId, is_reconnected: bool) -> Self {
        Self {
            connection_id: Some(connection_id),
            status: ConnectionStatus::Connected,
            is_reconnected,
        }
    }

    /// Recovery in progress; the old connection id is no longer valid.
    pub fn reconnecting() -> Self {
        Self {
            connection_id: None,
            status: ConnectionStatus::Reconnecting,
            is_reconnected: false,
        }
    }

    /// Closed.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Whether a live connection exists.
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}
