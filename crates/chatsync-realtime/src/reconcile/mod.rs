//! Message reconciliation: idempotent upsert into the canonical collection.
//!
//! Deliveries may repeat (reconnects, overlapping fetch and push). An
//! identical re-delivery leaves the stored `Arc` untouched so consumers
//! comparing by pointer see no change.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use chatsync_core::model::Message;
use chatsync_core::types::id::{ConversationId, MessageId};

/// Immutable view of the collection.
pub type MessageSnapshot = Arc<HashMap<MessageId, Arc<Message>>>;

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No message with this id existed.
    Inserted,
    /// Same id, different content; the new message replaced the old one.
    Replaced,
    /// Same id, same content; nothing changed.
    Unchanged,
}

impl UpsertOutcome {
    /// Whether the collection changed.
    pub fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Canonical messages keyed by id.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: RwLock<MessageSnapshot>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by id; no-op when content is identical.
    pub fn upsert(&self, message: Message) -> UpsertOutcome {
        let mut messages = self.messages.write().unwrap_or_else(|e| e.into_inner());

        let outcome = match messages.get(&message.id) {
            Some(stored) if **stored == message => return UpsertOutcome::Unchanged,
            Some(_) => UpsertOutcome::Replaced,
            None => UpsertOutcome::Inserted,
        };

        debug!(message_id = %message.id, outcome = ?outcome, "Message reconciled");
        Arc::make_mut(&mut *messages).insert(message.id, Arc::new(message));
        outcome
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> MessageSnapshot {
        self.messages
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Stored message by id.
    pub fn get(&self, id: &MessageId) -> Option<Arc<Message>> {
        self.snapshot().get(id).cloned()
    }

    /// Messages of one conversation, oldest first.
    pub fn conversation_messages(&self, conversation_id: ConversationId) -> Vec<Arc<Message>> {
        let mut messages: Vec<Arc<Message>> = self
            .snapshot()
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        messages
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every message.
    pub fn clear(&self) {
        let mut messages = self.messages.write().unwrap_or_else(|e| e.into_inner());
        *messages = Arc::default();
    }
}
