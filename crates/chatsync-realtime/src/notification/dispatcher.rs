//! Notification dispatcher: turns message pushes into notifications.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use chatsync_core::model::Message;
use chatsync_core::types::id::{ConversationId, UserId};

use crate::metrics::SyncMetrics;

use super::dedup::DisplayedNotifications;
use super::formatter::Notification;

#[derive(Debug, Default)]
struct Audience {
    /// Local user; their own messages never notify.
    self_id: Option<UserId>,
    /// Conversation on screen; its messages are already visible.
    focused: Option<ConversationId>,
}

/// Delivers each new message from someone else, outside the focused
/// conversation, at most once.
#[derive(Debug)]
pub struct NotificationDispatcher {
    /// Already shown
    displayed: DisplayedNotifications,
    audience: Mutex<Audience>,
    sender: broadcast::Sender<Notification>,
    metrics: Arc<SyncMetrics>,
}

impl NotificationDispatcher {
    /// Create a new dispatcher
    pub fn new(capacity: usize, metrics: Arc<SyncMetrics>) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            displayed: DisplayedNotifications::new(),
            audience: Mutex::new(Audience::default()),
            sender,
            metrics,
        }
    }

    /// Receive dispatched notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Set the local user.
    pub fn set_self(&self, self_id: Option<UserId>) {
        self.audience.lock().unwrap_or_else(|e| e.into_inner()).self_id = self_id;
    }

    /// Set the conversation currently on screen.
    pub fn set_focus(&self, conversation_id: Option<ConversationId>) {
        self.audience.lock().unwrap_or_else(|e| e.into_inner()).focused = conversation_id;
    }

    /// Dispatch a notification for `message` if it qualifies.
    ///
    /// Returns `true` if a notification was sent.
    pub fn on_message(&self, message: &Message) -> bool {
        {
            let audience = self.audience.lock().unwrap_or_else(|e| e.into_inner());
            if audience.self_id == Some(message.user_id) {
                return false;
            }
            if audience.focused == Some(message.conversation_id) {
                return false;
            }
        }

        let key = DisplayedNotifications::make_key("message", &message.id.to_string());
        if !self.displayed.mark_displayed(&key) {
            self.metrics.notification_deduplicated();
            tracing::trace!("Notification deduplicated: key='{}'", key);
            return false;
        }

        // No subscribers is fine; the message is still marked displayed.
        let _ = self.sender.send(Notification::new_message(message));
        true
    }

    /// Forget displayed notifications and the audience.
    pub fn clear(&self) {
        self.displayed.clear();
        *self.audience.lock().unwrap_or_else(|e| e.into_inner()) = Audience::default();
    }
}
