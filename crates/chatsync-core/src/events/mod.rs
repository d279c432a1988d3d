//! Closed event enums consumed by the real-time engine.
//!
//! Each category gets its own sum type so handlers match exhaustively.
//! Connection lifecycle events originate in the connection manager;
//! the other categories arrive as hub pushes.

use serde::{Deserialize, Serialize};

use crate::model::{Message, PresenceStatus, WritingActivityRecord};
use crate::types::id::{ConnectionId, UserId};

/// Lifecycle transitions of the single hub connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// First successful handshake of this connection's lifetime.
    Connected {
        /// Server-assigned id.
        connection_id: ConnectionId,
    },
    /// The transport dropped and automatic recovery started.
    Reconnecting {
        /// Why the transport dropped.
        reason: String,
    },
    /// Automatic recovery succeeded with a fresh connection id.
    Reconnected {
        /// New server-assigned id.
        connection_id: ConnectionId,
    },
    /// The connection is closed, either explicitly or after retries ran out.
    Disconnected {
        /// Why the connection closed.
        reason: String,
    },
}

impl ConnectionEvent {
    /// The live connection id carried by `Connected` / `Reconnected`.
    pub fn live_connection_id(&self) -> Option<&ConnectionId> {
        match self {
            Self::Connected { connection_id } | Self::Reconnected { connection_id } => {
                Some(connection_id)
            }
            Self::Reconnecting { .. } | Self::Disconnected { .. } => None,
        }
    }
}

/// Presence changes pushed by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEvent {
    /// A user's status changed.
    UserStatusChanged {
        /// User whose status changed.
        user_id: UserId,
        /// New status.
        status: PresenceStatus,
    },
}

/// Writing-activity changes pushed by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WritingActivityEvent {
    /// Someone started or stopped writing in a conversation.
    ConversationWritingActivity {
        /// The activity record.
        activity: WritingActivityRecord,
    },
}

/// Message changes pushed by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent {
    /// A message was posted (or re-delivered).
    NewMessage {
        /// The message.
        message: Message,
    },
}

/// Any push delivered on a live hub connection, in server-send order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubPush {
    /// Presence change.
    Presence(PresenceEvent),
    /// Writing-activity change.
    WritingActivity(WritingActivityEvent),
    /// Message change.
    Message(MessageEvent),
}

impl From<PresenceEvent> for HubPush {
    fn from(event: PresenceEvent) -> Self {
        Self::Presence(event)
    }
}

impl From<WritingActivityEvent> for HubPush {
    fn from(event: WritingActivityEvent) -> Self {
        Self::WritingActivity(event)
    }
}

impl From<MessageEvent> for HubPush {
    fn from(event: MessageEvent) -> Self {
        Self::Message(event)
    }
}
