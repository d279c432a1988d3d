//! Notification formatting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chatsync_core::model::Message;
use chatsync_core::types::id::{ConversationId, MessageId, UserId};

/// Longest body preview, in characters.
const PREVIEW_CHARS: usize = 120;

/// A user-facing "new message" notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub author_id: UserId,
    pub title: String,
    /// Message text, truncated.
    pub body: String,
    pub created: DateTime<Utc>,
}

impl Notification {
    /// Formats a new-message notification.
    pub fn new_message(message: &Message) -> Self {
        Self {
            message_id: message.id,
            conversation_id: message.conversation_id,
            author_id: message.user_id,
            title: "New message".to_string(),
            body: preview(&message.text),
            created: message.created,
        }
    }
}

/// First line of `text`, cut at [`PREVIEW_CHARS`] characters.
fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= PREVIEW_CHARS {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}
