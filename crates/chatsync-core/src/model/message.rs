//! Chat message as delivered by the hub.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::id::{ConversationId, MessageId, UserId};

/// A message posted to a conversation.
///
/// Equality is structural; the message store relies on it to detect
/// duplicate deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message ID.
    pub id: MessageId,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Author.
    pub user_id: UserId,
    /// Body text.
    pub text: String,
    /// Server creation time.
    pub created: DateTime<Utc>,
}
