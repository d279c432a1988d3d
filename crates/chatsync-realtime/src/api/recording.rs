//! In-memory [`HubApi`] that records every call.
//!
//! Used in tests and for offline runs where no REST API is reachable.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use chatsync_core::error::AppError;
use chatsync_core::model::WritingActivity;
use chatsync_core::result::AppResult;
use chatsync_core::types::id::{ConnectionId, ConversationId};

use super::HubApi;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Listen {
        conversation_id: ConversationId,
        connection_id: ConnectionId,
    },
    Unlisten {
        conversation_id: ConversationId,
        connection_id: ConnectionId,
    },
    PutWritingActivity {
        conversation_id: ConversationId,
        activity: WritingActivity,
    },
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<ApiCall>,
    failures: VecDeque<AppError>,
}

/// Recording API. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingHubApi {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingHubApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next call fail with `error` (the call is still recorded).
    pub fn fail_next(&self, error: AppError) {
        self.lock().failures.push_back(error);
    }

    /// All calls so far.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Drain the log.
    pub fn take_calls(&self) -> Vec<ApiCall> {
        std::mem::take(&mut self.lock().calls)
    }

    /// Writing activities broadcast so far, in order.
    pub fn writing_broadcasts(&self) -> Vec<(ConversationId, WritingActivity)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::PutWritingActivity {
                    conversation_id,
                    activity,
                } => Some((*conversation_id, *activity)),
                ApiCall::Listen { .. } | ApiCall::Unlisten { .. } => None,
            })
            .collect()
    }

    /// Conversations announced with `listen` on `connection_id`.
    pub fn listens_on(&self, connection_id: &ConnectionId) -> Vec<ConversationId> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::Listen {
                    conversation_id,
                    connection_id: id,
                } if id == connection_id => Some(*conversation_id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ApiCall) -> AppResult<()> {
        let mut recorded = self.lock();
        recorded.calls.push(call);
        match recorded.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HubApi for RecordingHubApi {
    async fn listen(
        &self,
        conversation_id: ConversationId,
        connection_id: &ConnectionId,
    ) -> AppResult<()> {
        self.record(ApiCall::Listen {
            conversation_id,
            connection_id: connection_id.clone(),
        })
    }

    async fn unlisten(
        &self,
        conversation_id: ConversationId,
        connection_id: &ConnectionId,
    ) -> AppResult<()> {
        self.record(ApiCall::Unlisten {
            conversation_id,
            connection_id: connection_id.clone(),
        })
    }

    async fn put_writing_activity(
        &self,
        conversation_id: ConversationId,
        activity: WritingActivity,
    ) -> AppResult<()> {
        self.record(ApiCall::PutWritingActivity {
            conversation_id,
            activity,
        })
    }
}
