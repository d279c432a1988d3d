//! Writing-activity ("is typing") records.

use serde::{Deserialize, Serialize};

use crate::types::id::{ConversationId, UserId};

/// Writing state of one user in one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritingActivity {
    /// The user is composing a message.
    IsWriting,
    /// The user cleared the input or went idle.
    StoppedWriting,
}

/// Last known writing activity for a `(conversation, user)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritingActivityRecord {
    /// Conversation the activity refers to.
    pub conversation_id: ConversationId,
    /// Writer.
    pub user_id: UserId,
    /// Name shown in the "is writing" indicator.
    pub user_name: String,
    /// Activity.
    pub activity: WritingActivity,
    /// When the activity changed, in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl WritingActivityRecord {
    /// Whether this record should replace `stored` under last-write-wins.
    ///
    /// Equal timestamps keep the stored record.
    pub fn supersedes(&self, stored: &WritingActivityRecord) -> bool {
        self.timestamp > stored.timestamp
    }
}
