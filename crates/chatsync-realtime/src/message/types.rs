//! Frames sent by the notification hub to the client.

use serde::{Deserialize, Serialize};

use chatsync_core::events::{HubPush, MessageEvent, PresenceEvent, WritingActivityEvent};
use chatsync_core::model::{Message, PresenceStatus, WritingActivityRecord};
use chatsync_core::types::id::{ConnectionId, UserId};

/// Messages sent by the hub to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// First frame of every connection; carries the server-assigned id.
    Handshake {
        /// Connection id used for group routing.
        connection_id: ConnectionId,
    },
    /// A message was posted to a conversation the connection listens to.
    NewMessage {
        /// The message.
        message: Message,
    },
    /// Someone started or stopped writing.
    ConversationWritingActivity {
        /// The activity record.
        activity: WritingActivityRecord,
    },
    /// A user's presence changed.
    UserStatusChanged {
        /// User ID.
        user_id: UserId,
        /// New status.
        status: PresenceStatus,
    },
    /// Hub-side error report.
    Error {
        /// Error code.
        code: String,
        /// Error description.
        message: String,
    },
}

impl ServerFrame {
    /// Converts a push frame into its event category.
    ///
    /// Returns `None` for control frames (`handshake`, `error`).
    pub fn into_push(self) -> Option<HubPush> {
        match self {
            Self::NewMessage { message } => Some(MessageEvent::NewMessage { message }.into()),
            Self::ConversationWritingActivity { activity } => {
                Some(WritingActivityEvent::ConversationWritingActivity { activity }.into())
            }
            Self::UserStatusChanged { user_id, status } => {
                Some(PresenceEvent::UserStatusChanged { user_id, status }.into())
            }
            Self::Handshake { .. } | Self::Error { .. } => None,
        }
    }
}

impl From<HubPush> for ServerFrame {
    fn from(push: HubPush) -> Self {
        match push {
            HubPush::Message(MessageEvent::NewMessage { message }) => Self::NewMessage { message },
            HubPush::WritingActivity(WritingActivityEvent::ConversationWritingActivity {
                activity,
            }) => Self::ConversationWritingActivity { activity },
            HubPush::Presence(PresenceEvent::UserStatusChanged { user_id, status }) => {
                Self::UserStatusChanged { user_id, status }
            }
        }
    }
}
