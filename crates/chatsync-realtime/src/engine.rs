//! Top-level sync engine that ties together all subsystems.
//!
//! The engine runs three tasks while started:
//!
//! - the event loop, the only place connection lifecycle events, hub
//!   pushes, and identity resets are applied to the stores, in order
//! - the indicator poll, re-deriving writing indicators as time passes
//! - the session task, connecting on sign-in and disconnecting on sign-out

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chatsync_core::config::AppConfig;
use chatsync_core::error::AppError;
use chatsync_core::events::{ConnectionEvent, HubPush, MessageEvent, WritingActivityEvent};
use chatsync_core::model::{Message, PresenceStatus};
use chatsync_core::result::AppResult;
use chatsync_core::time::Clock;
use chatsync_core::traits::{Identity, IdentityProvider, TokenProvider};
use chatsync_core::types::id::{ConnectionId, ConversationId, UserId};

use crate::api::HubApi;
use crate::connection::manager::{ConnectOptions, ConnectionManager, HubSignal};
use crate::connection::state::{ConnectionState, ConnectionStatus};
use crate::connection::transport::HubTransport;
use crate::membership::GroupMembership;
use crate::metrics::{MetricsSnapshot, SyncMetrics};
use crate::notification::{Notification, NotificationDispatcher};
use crate::presence::{PresenceReconciler, PresenceStore};
use crate::reconcile::{MessageStore, UpsertOutcome};
use crate::writing::{WritingActivityStore, WritingBroadcaster, WritingDisplay};

/// External collaborators the engine is wired to.
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Opens hub connections.
    pub transport: Arc<dyn HubTransport>,
    /// REST calls for membership and writing activity.
    pub api: Arc<dyn HubApi>,
    /// Signed-in user and change notification.
    pub identity: Arc<dyn IdentityProvider>,
    /// Fresh bearer token per handshake.
    pub token_provider: Arc<dyn TokenProvider>,
    /// Time source for writing windows.
    pub clock: Arc<dyn Clock>,
}

/// Stores and reconcilers shared by the engine handle and its tasks.
#[derive(Debug, Clone)]
struct Components {
    connections: Arc<ConnectionManager>,
    membership: Arc<GroupMembership>,
    presence: Arc<PresenceReconciler>,
    writing_store: Arc<WritingActivityStore>,
    writing_display: Arc<WritingDisplay>,
    broadcaster: Arc<WritingBroadcaster>,
    messages: Arc<MessageStore>,
    notifications: Arc<NotificationDispatcher>,
    metrics: Arc<SyncMetrics>,
    identity: Arc<dyn IdentityProvider>,
    connect_options: ConnectOptions,
}

/// Handles of a started engine.
#[derive(Debug)]
struct EngineTasks {
    /// Stops the event loop and the poll.
    cancel: CancellationToken,
    /// Stops the session task; cancelled first so it cannot reconnect
    /// while the engine shuts down.
    session_cancel: CancellationToken,
    /// Gives the signal receiver back so the engine can start again.
    event_loop: JoinHandle<mpsc::Receiver<HubSignal>>,
    poll: JoinHandle<()>,
    session: JoinHandle<()>,
}

/// Central sync engine.
#[derive(Debug)]
pub struct SyncEngine {
    components: Components,
    poll_interval: Duration,
    /// Present while stopped.
    signals: Mutex<Option<mpsc::Receiver<HubSignal>>>,
    tasks: Mutex<Option<EngineTasks>>,
}

impl SyncEngine {
    /// Creates a new engine with all subsystems. Nothing runs until
    /// [`SyncEngine::start`].
    pub fn new(config: &AppConfig, collaborators: Collaborators) -> Self {
        let metrics = Arc::new(SyncMetrics::new());

        let (connections, signals) = ConnectionManager::new(
            collaborators.transport,
            config.reconnect.clone(),
            config.hub.channel_buffer_size,
            metrics.clone(),
        );
        let membership = Arc::new(GroupMembership::new(
            collaborators.api.clone(),
            metrics.clone(),
        ));
        let presence = Arc::new(PresenceReconciler::new(Arc::new(PresenceStore::new())));
        let writing_store = Arc::new(WritingActivityStore::new());
        let writing_display = Arc::new(WritingDisplay::new(
            writing_store.clone(),
            collaborators.clock.clone(),
            config.writing.stale_after_ms,
        ));
        let broadcaster = Arc::new(WritingBroadcaster::new(
            collaborators.api,
            writing_store.clone(),
            collaborators.clock,
            config.writing.clone(),
            metrics.clone(),
        ));
        let notifications = Arc::new(NotificationDispatcher::new(
            config.hub.channel_buffer_size,
            metrics.clone(),
        ));

        info!(hub_url = %config.hub.url, "Sync engine initialized");

        Self {
            components: Components {
                connections: Arc::new(connections),
                membership,
                presence,
                writing_store,
                writing_display,
                broadcaster,
                messages: Arc::new(MessageStore::new()),
                notifications,
                metrics,
                identity: collaborators.identity,
                connect_options: ConnectOptions {
                    hub_url: config.hub.url.clone(),
                    token_provider: collaborators.token_provider,
                },
            },
            poll_interval: Duration::from_millis(config.writing.poll_interval_ms.max(1)),
            signals: Mutex::new(Some(signals)),
            tasks: Mutex::new(None),
        }
    }

    /// Start the engine and connect if someone is signed in.
    ///
    /// A failed initial connect leaves the engine running in the
    /// not-connected state; the next sign-in or [`SyncEngine::connect`]
    /// tries again.
    pub async fn start(&self) -> AppResult<()> {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_some() {
            return Err(AppError::conflict("Sync engine already started"));
        }
        let components = &self.components;
        components.broadcaster.start().await?;
        let Some(signals) = self.signals.lock().await.take() else {
            components.broadcaster.stop().await;
            return Err(AppError::internal("Sync engine signal receiver missing"));
        };

        let identity_rx = components.identity.subscribe();
        let current = identity_rx.borrow().clone();
        apply_identity(components, current.clone()).await;

        let cancel = CancellationToken::new();
        let session_cancel = CancellationToken::new();

        let event_loop = tokio::spawn(run_event_loop(
            components.clone(),
            signals,
            components.identity.subscribe(),
            current.as_ref().map(|i| i.user_id),
            cancel.clone(),
        ));
        let poll = tokio::spawn(run_indicator_poll(
            components.writing_display.clone(),
            self.poll_interval,
            cancel.clone(),
        ));
        let session = tokio::spawn(run_session(
            components.clone(),
            identity_rx,
            session_cancel.clone(),
        ));

        *tasks = Some(EngineTasks {
            cancel,
            session_cancel,
            event_loop,
            poll,
            session,
        });
        drop(tasks);

        info!(signed_in = current.is_some(), "Sync engine started");

        if current.is_some() {
            if let Err(e) = components.connections.connect(components.connect_options.clone()).await {
                warn!(error = %e, "Not connected for receiving notifications");
            }
        }
        Ok(())
    }

    /// Stop every task, disconnect (awaited), and clear session state.
    pub async fn stop(&self) {
        let Some(tasks) = self.tasks.lock().await.take() else {
            return;
        };
        info!("Stopping sync engine");

        tasks.session_cancel.cancel();
        if let Err(e) = tasks.session.await {
            error!(error = %e, "Session task ended abnormally");
        }

        // The event loop still runs, so it applies the final `Disconnected`.
        self.components.connections.disconnect().await;

        tasks.cancel.cancel();
        if let Err(e) = tasks.poll.await {
            error!(error = %e, "Indicator poll ended abnormally");
        }
        match tasks.event_loop.await {
            Ok(signals) => *self.signals.lock().await = Some(signals),
            Err(e) => error!(error = %e, "Event loop ended abnormally"),
        }

        self.components.broadcaster.stop().await;
        self.components.notifications.clear();

        info!("Sync engine stopped");
    }

    /// Connect now with the current credentials.
    pub async fn connect(&self) -> AppResult<ConnectionId> {
        self.components
            .connections
            .connect(self.components.connect_options.clone())
            .await
    }

    /// Start observing a conversation; announced on every (re)connect.
    pub async fn observe_conversation(&self, conversation_id: ConversationId) -> AppResult<()> {
        self.components.membership.observe(conversation_id).await
    }

    /// Stop observing a conversation.
    pub async fn leave_conversation(&self, conversation_id: ConversationId) -> AppResult<()> {
        self.components.writing_display.remove(conversation_id);
        self.components.membership.leave(conversation_id).await
    }

    /// Conversation currently on screen; its messages do not notify.
    pub fn focus_conversation(&self, conversation_id: Option<ConversationId>) {
        self.components.notifications.set_focus(conversation_id);
    }

    /// Feed the composer text of a conversation.
    pub async fn local_input(&self, conversation_id: ConversationId, text: impl Into<String>) -> AppResult<()> {
        self.components.broadcaster.input(conversation_id, text).await
    }

    /// Indicator text ("Ann is writing..") for a conversation.
    pub fn writing_indicator(&self, conversation_id: ConversationId) -> watch::Receiver<String> {
        self.components.writing_display.subscribe(conversation_id)
    }

    /// Merge a message obtained outside the hub (e.g. a history fetch).
    pub fn ingest_message(&self, message: Message) -> UpsertOutcome {
        self.components.messages.upsert(message)
    }

    /// Messages of a conversation, oldest first.
    pub fn messages(&self, conversation_id: ConversationId) -> Vec<Arc<Message>> {
        self.components.messages.conversation_messages(conversation_id)
    }

    /// Last known status of a user.
    pub fn presence_of(&self, user_id: &UserId) -> PresenceStatus {
        self.components.presence.store().status_of(user_id)
    }

    /// Current connection snapshot.
    pub fn connection_state(&self) -> ConnectionState {
        self.components.connections.state()
    }

    /// Receiver of connection snapshots.
    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.components.connections.subscribe_state()
    }

    /// Receiver of new-message notifications.
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.components.notifications.subscribe()
    }

    /// Metrics snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.components.metrics.snapshot()
    }
}

/// Reset per-user state for a new identity.
async fn apply_identity(components: &Components, identity: Option<Identity>) {
    let user_id = identity.as_ref().map(|i| i.user_id);

    components.presence.set_identity(user_id);
    components.writing_store.clear();
    components.messages.clear();
    components.notifications.clear();
    components.notifications.set_self(user_id);
    components.writing_display.set_self(user_id);
    if let Err(e) = components.broadcaster.set_identity(identity).await {
        warn!(error = %e, "Failed to reset local writing state");
    }
}

/// Applies lifecycle events, pushes, and identity resets in order.
async fn run_event_loop(
    components: Components,
    mut signals: mpsc::Receiver<HubSignal>,
    mut identity_rx: watch::Receiver<Option<Identity>>,
    mut current_user: Option<UserId>,
    cancel: CancellationToken,
) -> mpsc::Receiver<HubSignal> {
    identity_rx.mark_unchanged();
    let mut identity_open = true;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            signal = signals.recv() => match signal {
                Some(signal) => handle_signal(&components, signal).await,
                None => break,
            },
            changed = identity_rx.changed(), if identity_open => {
                if changed.is_err() {
                    // Provider dropped; keep processing hub signals.
                    identity_open = false;
                    continue;
                }
                let identity = identity_rx.borrow_and_update().clone();
                let user_id = identity.as_ref().map(|i| i.user_id);
                if user_id != current_user {
                    info!(signed_in = user_id.is_some(), "Identity changed; resetting session state");
                    current_user = user_id;
                    apply_identity(&components, identity).await;
                }
            }
        }
    }

    // Apply what was emitted before the stop, e.g. the final `Disconnected`.
    while let Ok(signal) = signals.try_recv() {
        handle_signal(&components, signal).await;
    }
    signals
}

async fn handle_signal(components: &Components, signal: HubSignal) {
    match signal {
        HubSignal::Lifecycle(event) => {
            match &event {
                ConnectionEvent::Connected { connection_id } => {
                    info!(connection_id = %connection_id, "Connected to hub");
                }
                ConnectionEvent::Reconnected { connection_id } => {
                    info!(connection_id = %connection_id, "Reconnected to hub");
                }
                ConnectionEvent::Reconnecting { reason } => {
                    warn!(reason = %reason, "Hub connection lost; reconnecting");
                }
                ConnectionEvent::Disconnected { reason } => {
                    info!(reason = %reason, "Disconnected from hub");
                }
            }
            components.presence.on_connection_event(&event);
            components.membership.on_connection_event(&event).await;
        }
        HubSignal::Push(push) => handle_push(components, push),
    }
}

fn handle_push(components: &Components, push: HubPush) {
    match push {
        HubPush::Presence(event) => {
            components.presence.on_presence_event(&event);
        }
        HubPush::WritingActivity(WritingActivityEvent::ConversationWritingActivity { activity }) => {
            let conversation_id = activity.conversation_id;
            if components.writing_store.apply(activity) {
                components.writing_display.refresh(conversation_id);
            }
        }
        HubPush::Message(MessageEvent::NewMessage { message }) => {
            let outcome = components.messages.upsert(message.clone());
            debug!(message_id = %message.id, outcome = ?outcome, "New message push");
            if outcome.changed() {
                components.notifications.on_message(&message);
            }
        }
    }
}

/// Re-derives writing indicators as time passes.
async fn run_indicator_poll(display: Arc<WritingDisplay>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                display.refresh_all();
            }
        }
    }
}

/// Connects on sign-in, disconnects on sign-out, and cycles the
/// connection when a different user signs in.
async fn run_session(
    components: Components,
    mut identity_rx: watch::Receiver<Option<Identity>>,
    cancel: CancellationToken,
) {
    let mut current_user = identity_rx.borrow_and_update().as_ref().map(|i| i.user_id);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = identity_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let user_id = identity_rx.borrow_and_update().as_ref().map(|i| i.user_id);
        if user_id == current_user {
            continue;
        }
        let previous = std::mem::replace(&mut current_user, user_id);

        if previous.is_some() {
            components.connections.disconnect().await;
        }
        if user_id.is_some() {
            let status = components.connections.state().status;
            if status == ConnectionStatus::Disconnected {
                if let Err(e) = components
                    .connections
                    .connect(components.connect_options.clone())
                    .await
                {
                    warn!(error = %e, "Not connected for receiving notifications");
                }
            }
        }
    }
}
