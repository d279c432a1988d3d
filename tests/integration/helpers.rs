//! Shared test helpers for integration tests.

use std::sync::Arc;
use std::time::Duration;

use chatsync_core::config::{AppConfig, ReconnectConfig};
use chatsync_core::events::HubPush;
use chatsync_core::model::{Message, WritingActivity, WritingActivityRecord};
use chatsync_core::time::{Clock, RuntimeClock};
use chatsync_core::traits::{Identity, SessionIdentity};
use chatsync_core::types::id::{ConversationId, MessageId, UserId};
use chatsync_realtime::api::RecordingHubApi;
use chatsync_realtime::connection::MemoryTransport;
use chatsync_realtime::{Collaborators, SyncEngine};

/// Test application context
pub struct TestApp {
    /// The engine under test
    pub engine: Arc<SyncEngine>,
    /// Hub side of the in-memory transport
    pub hub: MemoryTransport,
    /// Records membership and writing-activity calls
    pub api: RecordingHubApi,
    /// Identity and token source
    pub session: Arc<SessionIdentity>,
    /// The signed-in user
    pub me: Identity,
    /// Clock shared with the engine
    pub clock: RuntimeClock,
}

impl TestApp {
    /// Signed-in app with the default reconnect schedule, not started.
    pub fn new() -> Self {
        Self::with_retry_delays(vec![0, 2_000, 10_000, 30_000])
    }

    /// Signed-in app with a custom reconnect schedule, not started.
    pub fn with_retry_delays(retry_delays_ms: Vec<u64>) -> Self {
        let config = AppConfig {
            reconnect: ReconnectConfig {
                enabled: true,
                retry_delays_ms,
            },
            ..AppConfig::default()
        };

        let hub = MemoryTransport::new();
        let api = RecordingHubApi::new();
        let session = Arc::new(SessionIdentity::new());
        let me = Identity {
            user_id: UserId::new(),
            display_name: "Me".to_string(),
        };
        session.sign_in(me.clone(), "token-1");
        let clock = RuntimeClock::starting_at(1_700_000_000_000);

        let engine = Arc::new(SyncEngine::new(
            &config,
            Collaborators {
                transport: Arc::new(hub.clone()),
                api: Arc::new(api.clone()),
                identity: session.clone(),
                token_provider: session.clone(),
                clock: Arc::new(clock),
            },
        ));

        Self {
            engine,
            hub,
            api,
            session,
            me,
            clock,
        }
    }

    /// Started app.
    pub async fn started() -> Self {
        let app = Self::new();
        app.engine.start().await.expect("engine starts");
        settle().await;
        app
    }

    /// Current engine time in milliseconds.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Deliver a push and let the engine apply it.
    pub async fn push(&self, push: impl Into<HubPush>) {
        assert!(self.hub.push(push), "no open hub link");
        settle().await;
    }
}

/// Let spawned tasks run until they are idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Poll `condition` until it holds or fail after a while.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

pub fn message(conversation_id: ConversationId, user_id: UserId, text: &str) -> Message {
    Message {
        id: MessageId::new(),
        conversation_id,
        user_id,
        text: text.to_string(),
        created: chrono::Utc::now(),
    }
}

pub fn writing(
    conversation_id: ConversationId,
    user_id: UserId,
    name: &str,
    activity: WritingActivity,
    timestamp: i64,
) -> WritingActivityRecord {
    WritingActivityRecord {
        conversation_id,
        user_id,
        user_name: name.to_string(),
        activity,
        timestamp,
    }
}
