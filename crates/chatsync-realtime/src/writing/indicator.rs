//! "Who is writing" display derivation.
//!
//! The display is a pure function of the store snapshot, the local user,
//! and the current time, so it is re-derived both when a record changes
//! and on a fixed poll: a writer whose `StoppedWriting` never arrives still
//! ages out of the window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use chatsync_core::model::{WritingActivity, WritingActivityRecord};
use chatsync_core::time::{Clock, is_within};
use chatsync_core::types::id::{ConversationId, UserId};

use super::store::WritingActivityStore;

/// Names of users currently writing in `conversation_id`, sorted.
///
/// Excludes the local user, stopped writers, and records older than
/// `window_ms`.
pub fn writing_names<'a>(
    records: impl IntoIterator<Item = &'a WritingActivityRecord>,
    conversation_id: ConversationId,
    self_id: Option<UserId>,
    now_ms: i64,
    window_ms: i64,
) -> Vec<String> {
    let mut names: Vec<String> = records
        .into_iter()
        .filter(|r| r.conversation_id == conversation_id)
        .filter(|r| Some(r.user_id) != self_id)
        .filter(|r| r.activity == WritingActivity::IsWriting)
        .filter(|r| is_within(r.timestamp, window_ms, now_ms))
        .map(|r| r.user_name.clone())
        .collect();
    names.sort();
    names
}

/// Indicator text for a list of names.
pub fn format_writing<S: AsRef<str>>(names: &[S]) -> String {
    match names {
        [] => String::new(),
        [name] => format!("{} is writing..", name.as_ref()),
        _ => {
            let joined: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
            format!("{} are writing..", joined.join(", "))
        }
    }
}

/// Published indicator of one conversation.
#[derive(Debug)]
struct Indicator {
    /// Names behind the current text, sorted.
    names: Vec<String>,
    text: watch::Sender<String>,
}

/// Per-conversation indicators over a shared store.
#[derive(Debug)]
pub struct WritingDisplay {
    store: Arc<WritingActivityStore>,
    clock: Arc<dyn Clock>,
    window_ms: i64,
    self_id: Mutex<Option<UserId>>,
    indicators: DashMap<ConversationId, Indicator>,
}

impl WritingDisplay {
    pub fn new(store: Arc<WritingActivityStore>, clock: Arc<dyn Clock>, window_ms: i64) -> Self {
        Self {
            store,
            clock,
            window_ms,
            self_id: Mutex::new(None),
            indicators: DashMap::new(),
        }
    }

    fn self_id(&self) -> MutexGuard<'_, Option<UserId>> {
        self.self_id.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Change the local user and re-derive everything.
    pub fn set_self(&self, self_id: Option<UserId>) {
        *self.self_id() = self_id;
        self.refresh_all();
    }

    /// Receiver of the indicator text for `conversation_id`.
    pub fn subscribe(&self, conversation_id: ConversationId) -> watch::Receiver<String> {
        let rx = self
            .indicators
            .entry(conversation_id)
            .or_insert_with(|| Indicator {
                names: Vec::new(),
                text: watch::channel(String::new()).0,
            })
            .text
            .subscribe();
        self.refresh(conversation_id);
        rx
    }

    /// Re-derive one conversation. Returns `true` if its name set changed.
    pub fn refresh(&self, conversation_id: ConversationId) -> bool {
        let self_id = *self.self_id();
        let snapshot = self.store.snapshot();
        let now_ms = self.clock.now_ms();

        match self.indicators.get_mut(&conversation_id) {
            Some(mut indicator) => {
                let names = writing_names(snapshot.values(), conversation_id, self_id, now_ms, self.window_ms);
                publish(conversation_id, &mut indicator, names)
            }
            None => false,
        }
    }

    /// Re-derive every subscribed conversation. Returns how many changed.
    pub fn refresh_all(&self) -> usize {
        let self_id = *self.self_id();
        let snapshot = self.store.snapshot();
        let now_ms = self.clock.now_ms();

        let mut by_conversation: HashMap<ConversationId, Vec<&WritingActivityRecord>> = HashMap::new();
        for record in snapshot.values() {
            by_conversation
                .entry(record.conversation_id)
                .or_default()
                .push(record);
        }

        let mut changed = 0;
        for mut entry in self.indicators.iter_mut() {
            let conversation_id = *entry.key();
            let records = by_conversation.remove(&conversation_id).unwrap_or_default();
            let names = writing_names(records, conversation_id, self_id, now_ms, self.window_ms);
            if publish(conversation_id, entry.value_mut(), names) {
                changed += 1;
            }
        }
        changed
    }

    /// Drop an indicator nobody needs anymore.
    pub fn remove(&self, conversation_id: ConversationId) {
        self.indicators.remove(&conversation_id);
    }
}

/// Sends new text when the name set differs from the published one.
fn publish(conversation_id: ConversationId, indicator: &mut Indicator, names: Vec<String>) -> bool {
    if indicator.names == names {
        return false;
    }
    let text = format_writing(&names);
    debug!(conversation_id = %conversation_id, text = %text, "Writing indicator changed");
    indicator.names = names;
    indicator.text.send_replace(text);
    true
}
