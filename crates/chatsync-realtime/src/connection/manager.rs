//! Connection manager: owns the single hub connection, its automatic
//! recovery, and the lifecycle events it emits.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chatsync_core::config::ReconnectConfig;
use chatsync_core::error::AppError;
use chatsync_core::events::{ConnectionEvent, HubPush};
use chatsync_core::result::AppResult;
use chatsync_core::traits::TokenProvider;
use chatsync_core::types::id::ConnectionId;

use crate::metrics::SyncMetrics;

use super::state::{ConnectionState, ConnectionStatus};
use super::transport::{HubLink, HubTransport};

/// Everything the connection manager emits, in the order it happened.
///
/// Lifecycle events and pushes share one channel so a consumer never sees
/// a push before the `Connected`/`Reconnected` of the link it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubSignal {
    /// Connection lifecycle transition.
    Lifecycle(ConnectionEvent),
    /// Push received on the live connection.
    Push(HubPush),
}

/// Parameters of [`ConnectionManager::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Hub endpoint.
    pub hub_url: String,
    /// Asked for a fresh token on every handshake attempt.
    pub token_provider: Arc<dyn TokenProvider>,
}

/// The background task and its stop signal.
#[derive(Debug)]
struct ActiveConnection {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns at most one live hub connection.
#[derive(Debug)]
pub struct ConnectionManager {
    /// Opens links.
    transport: Arc<dyn HubTransport>,
    /// Retry schedule after a dropped transport.
    reconnect: ReconnectConfig,
    /// Published connection snapshot.
    state: Arc<watch::Sender<ConnectionState>>,
    /// Lifecycle + push output.
    signals: mpsc::Sender<HubSignal>,
    /// Running connection, if any.
    active: Mutex<Option<ActiveConnection>>,
    /// Metrics.
    metrics: Arc<SyncMetrics>,
}

impl ConnectionManager {
    /// Creates a manager.
    ///
    /// Returns the manager and the receiver of everything it emits.
    pub fn new(
        transport: Arc<dyn HubTransport>,
        reconnect: ReconnectConfig,
        channel_buffer_size: usize,
        metrics: Arc<SyncMetrics>,
    ) -> (Self, mpsc::Receiver<HubSignal>) {
        let (signals, rx) = mpsc::channel(channel_buffer_size);
        let (state, _) = watch::channel(ConnectionState::disconnected());

        let manager = Self {
            transport,
            reconnect,
            state: Arc::new(state),
            signals,
            active: Mutex::new(None),
            metrics,
        };

        (manager, rx)
    }

    /// Establishes the connection.
    ///
    /// Fails with `Authentication` when the token provider yields an empty
    /// token or the hub rejects it, with `Transport` on network failure, and
    /// with `Conflict` when a connection is already active. On success emits
    /// [`ConnectionEvent::Connected`] and starts the background task that
    /// forwards pushes and recovers from dropped transports.
    pub async fn connect(&self, options: ConnectOptions) -> AppResult<ConnectionId> {
        let mut active = self.active.lock().await;

        // A task that reached `Disconnected` on its own is terminating.
        if let Some(existing) = active.take() {
            if self.state.borrow().status != ConnectionStatus::Disconnected {
                *active = Some(existing);
                return Err(AppError::conflict("Hub connection is already active"));
            }
            if let Err(e) = existing.task.await {
                warn!(error = %e, "Previous connection task ended abnormally");
            }
        }

        if !transition(&self.state, ConnectionState::connecting()) {
            return Err(AppError::conflict(format!(
                "Cannot connect while {}",
                self.state.borrow().status.as_str()
            )));
        }

        let link = match handshake(self.transport.as_ref(), &options).await {
            Ok(link) => link,
            Err(e) => {
                transition(&self.state, ConnectionState::disconnected());
                warn!(hub_url = %options.hub_url, error = %e, "Hub handshake failed");
                return Err(e);
            }
        };

        let connection_id = link.connection_id().clone();
        transition(
            &self.state,
            ConnectionState::connected(connection_id.clone(), false),
        );
        self.metrics.connected();
        let _ = self
            .signals
            .send(HubSignal::Lifecycle(ConnectionEvent::Connected {
                connection_id: connection_id.clone(),
            }))
            .await;

        let cancel = CancellationToken::new();
        let task = ConnectionTask {
            link,
            transport: self.transport.clone(),
            options,
            reconnect: self.reconnect.clone(),
            state: self.state.clone(),
            signals: self.signals.clone(),
            metrics: self.metrics.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(task.run());
        *active = Some(ActiveConnection { cancel, task });

        info!(connection_id = %connection_id, "Hub connection established");

        Ok(connection_id)
    }

    /// Stops the connection.
    ///
    /// Waits for the background task to finish before clearing the state,
    /// so no push or lifecycle event is emitted for the old connection after
    /// this returns (other than the final `Disconnected`). Idempotent.
    pub async fn disconnect(&self) {
        let mut active = self.active.lock().await;
        let Some(connection) = active.as_mut() else {
            return;
        };

        connection.cancel.cancel();
        if let Err(e) = (&mut connection.task).await {
            error!(error = %e, "Connection task ended abnormally");
        }
        *active = None;

        let was_live = self.state.borrow().status != ConnectionStatus::Disconnected;
        if was_live {
            transition(&self.state, ConnectionState::disconnected());
            let _ = self
                .signals
                .send(HubSignal::Lifecycle(ConnectionEvent::Disconnected {
                    reason: "Connection stopped".to_string(),
                }))
                .await;
        }

        info!("Hub connection stopped");
    }

    /// Current connection snapshot.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every connection transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Id of the live connection, if connected.
    pub fn current_connection_id(&self) -> Option<ConnectionId> {
        self.state.borrow().connection_id.clone()
    }
}

/// Applies `next` if the state machine allows it.
fn transition(state: &watch::Sender<ConnectionState>, next: ConnectionState) -> bool {
    let mut applied = false;
    let target = next.status;
    state.send_if_modified(|current| {
        if current.status.can_transition_to(next.status) {
            *current = next;
            applied = true;
        }
        applied
    });
    if !applied {
        warn!(
            from = %state.borrow().status.as_str(),
            to = %target.as_str(),
            "Rejected invalid connection transition"
        );
    }
    applied
}

/// One handshake attempt with a freshly fetched token.
async fn handshake(
    transport: &dyn HubTransport,
    options: &ConnectOptions,
) -> AppResult<Box<dyn HubLink>> {
    let token = options.token_provider.access_token().await?;
    if token.trim().is_empty() {
        return Err(AppError::authentication(
            "Token provider returned an empty token",
        ));
    }
    transport.open(&options.hub_url, &token).await
}

/// Why pumping a link stopped.
enum PumpEnd {
    /// Transport dropped.
    Dropped(String),
    /// Nobody listens for signals anymore.
    ReceiverGone,
}

/// Result of the reconnect loop.
enum Recovery {
    Reconnected(Box<dyn HubLink>),
    Exhausted(String),
    Cancelled,
}

/// Background task owning the live link.
struct ConnectionTask {
    link: Box<dyn HubLink>,
    transport: Arc<dyn HubTransport>,
    options: ConnectOptions,
    reconnect: ReconnectConfig,
    state: Arc<watch::Sender<ConnectionState>>,
    signals: mpsc::Sender<HubSignal>,
    metrics: Arc<SyncMetrics>,
    cancel: CancellationToken,
}

impl ConnectionTask {
    async fn run(mut self) {
        loop {
            let end = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.link.close().await;
                    return;
                }
                end = pump(self.link.as_mut(), &self.signals, &self.metrics) => end,
            };

            let reason = match end {
                PumpEnd::Dropped(reason) => reason,
                PumpEnd::ReceiverGone => {
                    debug!("Signal receiver dropped; closing hub link");
                    self.link.close().await;
                    return;
                }
            };

            warn!(reason = %reason, "Hub connection dropped, reconnecting");
            transition(&self.state, ConnectionState::reconnecting());
            self.emit(ConnectionEvent::Reconnecting {
                reason: reason.clone(),
            })
            .await;

            match self.recover(reason).await {
                Recovery::Reconnected(link) => {
                    let connection_id = link.connection_id().clone();
                    transition(
                        &self.state,
                        ConnectionState::connected(connection_id.clone(), true),
                    );
                    self.metrics.reconnected();
                    info!(connection_id = %connection_id, "Hub connection recovered");
                    self.link = link;
                    self.emit(ConnectionEvent::Reconnected { connection_id })
                        .await;
                }
                Recovery::Exhausted(reason) => {
                    transition(&self.state, ConnectionState::disconnected());
                    self.metrics.terminally_disconnected();
                    error!(reason = %reason, "Hub reconnection exhausted");
                    self.emit(ConnectionEvent::Disconnected { reason }).await;
                    return;
                }
                Recovery::Cancelled => return,
            }
        }
    }

    /// Retries the handshake following the configured delay schedule.
    async fn recover(&self, mut last_error: String) -> Recovery {
        let mut attempt = 0usize;
        loop {
            let Some(delay) = self.reconnect.delay_for_attempt(attempt) else {
                return Recovery::Exhausted(last_error);
            };
            attempt += 1;

            debug!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect attempt");
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Recovery::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Recovery::Cancelled,
                result = handshake(self.transport.as_ref(), &self.options) => result,
            };

            match result {
                Ok(link) => return Recovery::Reconnected(link),
                Err(e) => {
                    warn!(attempt, error = %e, "Reconnect attempt failed");
                    last_error = e.to_string();
                }
            }
        }
    }

    async fn emit(&self, event: ConnectionEvent) {
        let _ = self.signals.send(HubSignal::Lifecycle(event)).await;
    }
}

/// Forwards pushes until the transport drops.
async fn pump(
    link: &mut dyn HubLink,
    signals: &mpsc::Sender<HubSignal>,
    metrics: &SyncMetrics,
) -> PumpEnd {
    loop {
        match link.next_push().await {
            Ok(push) => {
                metrics.push_received();
                if signals.send(HubSignal::Push(push)).await.is_err() {
                    return PumpEnd::ReceiverGone;
                }
            }
            Err(e) => return PumpEnd::Dropped(e.message),
        }
    }
}
