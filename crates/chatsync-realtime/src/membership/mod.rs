//! Hub group membership: which conversations this connection listens to.
//!
//! Memberships belong to a connection id. Every `Connected`/`Reconnected`
//! invalidates the previous id, so each observed conversation is announced
//! again with the new one.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use chatsync_core::error::AppError;
use chatsync_core::events::ConnectionEvent;
use chatsync_core::result::AppResult;
use chatsync_core::types::id::{ConnectionId, ConversationId};

use crate::api::HubApi;
use crate::metrics::SyncMetrics;

#[derive(Debug, Default)]
struct MembershipState {
    /// Conversations the application currently observes.
    observed: BTreeSet<ConversationId>,
    /// Observed conversations the hub acknowledged for `connection_id`.
    announced: BTreeSet<ConversationId>,
    /// Connection memberships are valid for; `None` while not connected.
    connection_id: Option<ConnectionId>,
}

/// Tracks observed conversations and announces them to the hub.
#[derive(Debug)]
pub struct GroupMembership {
    api: Arc<dyn HubApi>,
    /// Held across announcements so concurrent calls never interleave.
    state: Mutex<MembershipState>,
    metrics: Arc<SyncMetrics>,
}

impl GroupMembership {
    pub fn new(api: Arc<dyn HubApi>, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            api,
            state: Mutex::new(MembershipState::default()),
            metrics,
        }
    }

    /// Start observing a conversation.
    ///
    /// Announces immediately when connected; otherwise the announcement
    /// happens on the next `Connected`/`Reconnected`. Observing a
    /// conversation that is already announced does nothing; one whose
    /// announcement failed is announced again.
    pub async fn observe(&self, conversation_id: ConversationId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.observed.insert(conversation_id);
        if state.announced.contains(&conversation_id) {
            return Ok(());
        }
        match state.connection_id.clone() {
            Some(connection_id) => {
                self.listen(&state, conversation_id, &connection_id).await?;
                state.announced.insert(conversation_id);
                Ok(())
            }
            None => {
                debug!(conversation_id = %conversation_id, "Observing conversation; announcement deferred until connected");
                Ok(())
            }
        }
    }

    /// Stop observing a conversation.
    pub async fn leave(&self, conversation_id: ConversationId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.observed.remove(&conversation_id) {
            return Ok(());
        }
        if !state.announced.remove(&conversation_id) {
            return Ok(());
        }
        match state.connection_id.clone() {
            Some(connection_id) => self.api.unlisten(conversation_id, &connection_id).await,
            None => Ok(()),
        }
    }

    /// Announce one conversation on `connection_id`.
    ///
    /// Fails with `StaleGroupMembership` unless `connection_id` is the
    /// current connection.
    pub async fn announce(
        &self,
        conversation_id: ConversationId,
        connection_id: &ConnectionId,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        self.listen(&state, conversation_id, connection_id).await?;
        if state.observed.contains(&conversation_id) {
            state.announced.insert(conversation_id);
        }
        Ok(())
    }

    /// React to a connection lifecycle event.
    ///
    /// Returns the number of conversations announced. Conversations whose
    /// announcement fails stay pending and are retried by the next
    /// [`observe`](Self::observe) or (re)connect.
    pub async fn on_connection_event(&self, event: &ConnectionEvent) -> usize {
        let mut state = self.state.lock().await;
        match event {
            ConnectionEvent::Connected { connection_id }
            | ConnectionEvent::Reconnected { connection_id } => {
                state.connection_id = Some(connection_id.clone());
                state.announced.clear();
                let observed: Vec<ConversationId> = state.observed.iter().copied().collect();

                let mut pending = 0;
                for conversation_id in observed {
                    match self.listen(&state, conversation_id, connection_id).await {
                        Ok(()) => {
                            state.announced.insert(conversation_id);
                        }
                        Err(e) => {
                            pending += 1;
                            warn!(
                                conversation_id = %conversation_id,
                                connection_id = %connection_id,
                                error = %e,
                                "Group announcement failed"
                            );
                        }
                    }
                }
                let announced = state.announced.len();
                info!(connection_id = %connection_id, announced, pending, "Group memberships announced");
                announced
            }
            ConnectionEvent::Reconnecting { .. } | ConnectionEvent::Disconnected { .. } => {
                state.announced.clear();
                if state.connection_id.take().is_some() {
                    debug!("Group memberships invalidated");
                }
                0
            }
        }
    }

    /// Conversations currently observed.
    pub async fn observed(&self) -> Vec<ConversationId> {
        self.state.lock().await.observed.iter().copied().collect()
    }

    /// Observed conversations not yet acknowledged on the current connection.
    pub async fn pending(&self) -> Vec<ConversationId> {
        let state = self.state.lock().await;
        state.observed.difference(&state.announced).copied().collect()
    }

    /// Connection the memberships are valid for.
    pub async fn current_connection(&self) -> Option<ConnectionId> {
        self.state.lock().await.connection_id.clone()
    }

    async fn listen(
        &self,
        state: &MembershipState,
        conversation_id: ConversationId,
        connection_id: &ConnectionId,
    ) -> AppResult<()> {
        if state.connection_id.as_ref() != Some(connection_id) {
            return Err(AppError::stale_membership(format!(
                "Connection {connection_id} is not the current connection"
            )));
        }
        self.api.listen(conversation_id, connection_id).await?;
        self.metrics.announced();
        debug!(conversation_id = %conversation_id, connection_id = %connection_id, "Announced group membership");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiCall, RecordingHubApi};
    use chatsync_core::error::ErrorKind;

    fn membership() -> (GroupMembership, RecordingHubApi) {
        let api = RecordingHubApi::new();
        (
            GroupMembership::new(Arc::new(api.clone()), Arc::new(SyncMetrics::new())),
            api,
        )
    }

    fn connected(id: &str) -> ConnectionEvent {
        ConnectionEvent::Connected {
            connection_id: ConnectionId::new(id),
        }
    }

    #[tokio::test]
    async fn test_observe_before_connect_defers_announcement() {
        let (membership, api) = membership();
        let conversation = ConversationId::new();

        membership.observe(conversation).await.unwrap();
        assert!(api.calls().is_empty());

        assert_eq!(membership.on_connection_event(&connected("c1")).await, 1);
        assert_eq!(api.listens_on(&ConnectionId::new("c1")), vec![conversation]);
    }

    #[tokio::test]
    async fn test_reconnect_reannounces_each_conversation_once_with_new_id() {
        let (membership, api) = membership();
        let a = ConversationId::new();
        let b = ConversationId::new();

        membership.on_connection_event(&connected("old")).await;
        membership.observe(a).await.unwrap();
        membership.observe(b).await.unwrap();
        membership.observe(a).await.unwrap();
        api.take_calls();

        membership
            .on_connection_event(&ConnectionEvent::Reconnecting {
                reason: "drop".to_string(),
            })
            .await;
        let announced = membership
            .on_connection_event(&ConnectionEvent::Reconnected {
                connection_id: ConnectionId::new("new"),
            })
            .await;

        assert_eq!(announced, 2);
        let mut on_new = api.listens_on(&ConnectionId::new("new"));
        on_new.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(on_new, expected);
        assert!(api.listens_on(&ConnectionId::new("old")).is_empty());
    }

    #[tokio::test]
    async fn test_stale_connection_id_is_rejected() {
        let (membership, api) = membership();
        membership.on_connection_event(&connected("c1")).await;
        membership
            .on_connection_event(&ConnectionEvent::Reconnected {
                connection_id: ConnectionId::new("c2"),
            })
            .await;

        let err = membership
            .announce(ConversationId::new(), &ConnectionId::new("c1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::StaleGroupMembership);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_invalidates_memberships() {
        let (membership, _api) = membership();
        membership.on_connection_event(&connected("c1")).await;
        membership
            .on_connection_event(&ConnectionEvent::Disconnected {
                reason: "stopped".to_string(),
            })
            .await;

        assert_eq!(membership.current_connection().await, None);
        let err = membership
            .announce(ConversationId::new(), &ConnectionId::new("c1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::StaleGroupMembership);
    }

    #[tokio::test]
    async fn test_leave_unlistens_on_current_connection() {
        let (membership, api) = membership();
        let conversation = ConversationId::new();
        membership.on_connection_event(&connected("c1")).await;
        membership.observe(conversation).await.unwrap();
        membership.leave(conversation).await.unwrap();

        assert_eq!(
            api.calls().last(),
            Some(&ApiCall::Unlisten {
                conversation_id: conversation,
                connection_id: ConnectionId::new("c1"),
            })
        );
        assert!(membership.observed().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_announcement_is_retried_by_next_observe() {
        let (membership, api) = membership();
        let conversation = ConversationId::new();
        let c1 = ConnectionId::new("c1");
        membership.on_connection_event(&connected("c1")).await;

        api.fail_next(AppError::transport("bad gateway"));
        let err = membership.observe(conversation).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transport);
        assert_eq!(membership.pending().await, vec![conversation]);

        membership.observe(conversation).await.unwrap();
        assert_eq!(api.listens_on(&c1), vec![conversation, conversation]);
        assert!(membership.pending().await.is_empty());

        // Announced now, so a further observe is a no-op.
        membership.observe(conversation).await.unwrap();
        assert_eq!(api.listens_on(&c1).len(), 2);
    }

    #[tokio::test]
    async fn test_failed_reannouncement_stays_pending() {
        let (membership, api) = membership();
        let a = ConversationId::new();
        let b = ConversationId::new();
        membership.observe(a).await.unwrap();
        membership.observe(b).await.unwrap();

        api.fail_next(AppError::transport("bad gateway"));
        assert_eq!(membership.on_connection_event(&connected("c1")).await, 1);
        assert_eq!(membership.pending().await.len(), 1);

        let missing = membership.pending().await[0];
        membership.observe(missing).await.unwrap();
        assert!(membership.pending().await.is_empty());

        let mut on_c1 = api.listens_on(&ConnectionId::new("c1"));
        on_c1.sort();
        on_c1.dedup();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(on_c1, expected);
    }
}
