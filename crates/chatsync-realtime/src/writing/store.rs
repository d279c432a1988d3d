//! Writing-activity store: last record per `(conversation, user)`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chatsync_core::model::WritingActivityRecord;
use chatsync_core::types::id::{ConversationId, UserId};

type RecordKey = (ConversationId, UserId);

/// Immutable view of the store at one point in time.
pub type WritingSnapshot = Arc<HashMap<RecordKey, WritingActivityRecord>>;

/// Last-write-wins record store.
///
/// Writers copy the map on write, so a snapshot taken by a reader never
/// changes underneath it. Stale records are kept; display derivation
/// filters them out by time.
#[derive(Debug, Default)]
pub struct WritingActivityStore {
    records: RwLock<WritingSnapshot>,
}

impl WritingActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a record.
    ///
    /// An incoming record older than or as old as the stored one is
    /// discarded. Returns `true` if the store changed.
    pub fn apply(&self, record: WritingActivityRecord) -> bool {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let key = (record.conversation_id, record.user_id);

        if let Some(stored) = records.get(&key) {
            if !record.supersedes(stored) {
                return false;
            }
        }

        Arc::make_mut(&mut *records).insert(key, record);
        true
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> WritingSnapshot {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Stored record for a pair.
    pub fn get(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Option<WritingActivityRecord> {
        self.snapshot().get(&(conversation_id, user_id)).cloned()
    }

    /// All records of one conversation, stale ones included.
    pub fn conversation_records(&self, conversation_id: ConversationId) -> Vec<WritingActivityRecord> {
        self.snapshot()
            .values()
            .filter(|record| record.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Forget everything.
    pub fn clear(&self) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        *records = Arc::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_core::model::WritingActivity;

    fn record(
        conversation_id: ConversationId,
        user_id: UserId,
        activity: WritingActivity,
        timestamp: i64,
    ) -> WritingActivityRecord {
        WritingActivityRecord {
            conversation_id,
            user_id,
            user_name: "Ann".to_string(),
            activity,
            timestamp,
        }
    }

    #[test]
    fn test_out_of_order_older_record_is_discarded() {
        let store = WritingActivityStore::new();
        let (c, u) = (ConversationId::new(), UserId::new());

        assert!(store.apply(record(c, u, WritingActivity::IsWriting, 100)));
        assert!(!store.apply(record(c, u, WritingActivity::StoppedWriting, 50)));

        let stored = store.get(c, u).unwrap();
        assert_eq!(stored.activity, WritingActivity::IsWriting);
        assert_eq!(stored.timestamp, 100);
    }

    #[test]
    fn test_equal_timestamp_keeps_stored_record() {
        let store = WritingActivityStore::new();
        let (c, u) = (ConversationId::new(), UserId::new());

        store.apply(record(c, u, WritingActivity::IsWriting, 100));
        assert!(!store.apply(record(c, u, WritingActivity::StoppedWriting, 100)));
        assert_eq!(store.get(c, u).unwrap().activity, WritingActivity::IsWriting);
    }

    #[test]
    fn test_snapshot_is_not_affected_by_later_writes() {
        let store = WritingActivityStore::new();
        let (c, u) = (ConversationId::new(), UserId::new());
        store.apply(record(c, u, WritingActivity::IsWriting, 1));

        let before = store.snapshot();
        store.apply(record(c, u, WritingActivity::StoppedWriting, 2));

        assert_eq!(before[&(c, u)].activity, WritingActivity::IsWriting);
        assert_eq!(store.get(c, u).unwrap().activity, WritingActivity::StoppedWriting);
    }

    #[test]
    fn test_records_are_per_conversation() {
        let store = WritingActivityStore::new();
        let u = UserId::new();
        let (a, b) = (ConversationId::new(), ConversationId::new());
        store.apply(record(a, u, WritingActivity::IsWriting, 10));
        store.apply(record(b, u, WritingActivity::IsWriting, 5));

        assert_eq!(store.conversation_records(a).len(), 1);
        assert_eq!(store.conversation_records(b).len(), 1);

        store.clear();
        assert!(store.snapshot().is_empty());
    }
}
