//! Outbound writing-activity broadcaster.
//!
//! Runs one task that owns a [`LocalWritingState`] per conversation, feeds
//! it input and trailing-timer expiries, publishes the resulting activity
//! through [`HubApi`], and mirrors it into the shared store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatsync_core::config::WritingConfig;
use chatsync_core::error::AppError;
use chatsync_core::model::{WritingActivity, WritingActivityRecord};
use chatsync_core::result::AppResult;
use chatsync_core::time::Clock;
use chatsync_core::traits::Identity;
use chatsync_core::types::id::ConversationId;

use crate::api::HubApi;
use crate::metrics::SyncMetrics;

use super::local::LocalWritingState;
use super::store::WritingActivityStore;

#[derive(Debug)]
enum Command {
    Input {
        conversation_id: ConversationId,
        text: String,
    },
    /// Forget all local state (identity change).
    Reset,
}

/// State shared between the handle and its task.
#[derive(Debug)]
struct Shared {
    api: Arc<dyn HubApi>,
    store: Arc<WritingActivityStore>,
    clock: Arc<dyn Clock>,
    config: WritingConfig,
    metrics: Arc<SyncMetrics>,
    identity: Mutex<Option<Identity>>,
}

impl Shared {
    fn identity(&self) -> MutexGuard<'_, Option<Identity>> {
        self.identity.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mirror locally and send to the server.
    async fn publish(&self, conversation_id: ConversationId, activity: WritingActivity, now_ms: i64) {
        let identity = self.identity().clone();
        if let Some(identity) = identity {
            self.store.apply(WritingActivityRecord {
                conversation_id,
                user_id: identity.user_id,
                user_name: identity.display_name,
                activity,
                timestamp: now_ms,
            });
        }

        match self.api.put_writing_activity(conversation_id, activity).await {
            Ok(()) => {
                self.metrics.writing_broadcast();
                debug!(conversation_id = %conversation_id, activity = ?activity, "Writing activity broadcast");
            }
            Err(e) => warn!(
                conversation_id = %conversation_id,
                activity = ?activity,
                error = %e,
                "Writing activity broadcast failed"
            ),
        }
    }
}

#[derive(Debug)]
struct Running {
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Debounces local input into writing-activity broadcasts.
#[derive(Debug)]
pub struct WritingBroadcaster {
    shared: Arc<Shared>,
    running: tokio::sync::Mutex<Option<Running>>,
}

impl WritingBroadcaster {
    pub fn new(
        api: Arc<dyn HubApi>,
        store: Arc<WritingActivityStore>,
        clock: Arc<dyn Clock>,
        config: WritingConfig,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                store,
                clock,
                config,
                metrics,
                identity: Mutex::new(None),
            }),
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Spawn the broadcaster task.
    pub async fn start(&self) -> AppResult<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(AppError::conflict("Writing broadcaster already started"));
        }

        let (commands, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(self.shared.clone(), rx, cancel.clone()));
        *running = Some(Running {
            commands,
            cancel,
            task,
        });

        info!("Writing broadcaster started");
        Ok(())
    }

    /// Stop the task and wait for it. Pending trailing stops are dropped.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(e) = running.task.await {
            warn!(error = %e, "Writing broadcaster task ended abnormally");
        }
        info!("Writing broadcaster stopped");
    }

    /// Feed the current input text of a conversation's composer.
    pub async fn input(&self, conversation_id: ConversationId, text: impl Into<String>) -> AppResult<()> {
        self.send(Command::Input {
            conversation_id,
            text: text.into(),
        })
        .await
    }

    /// Replace the local identity; clears all local writing state.
    pub async fn set_identity(&self, identity: Option<Identity>) -> AppResult<()> {
        *self.shared.identity() = identity;
        if self.running.lock().await.is_some() {
            self.send(Command::Reset).await?;
        }
        Ok(())
    }

    async fn send(&self, command: Command) -> AppResult<()> {
        let running = self.running.lock().await;
        let Some(running) = running.as_ref() else {
            return Err(AppError::not_connected("Writing broadcaster is not running"));
        };
        running
            .commands
            .send(command)
            .map_err(|_| AppError::internal("Writing broadcaster task is gone"))
    }
}

async fn run(shared: Arc<Shared>, mut commands: mpsc::UnboundedReceiver<Command>, cancel: CancellationToken) {
    let mut states: HashMap<ConversationId, LocalWritingState> = HashMap::new();

    loop {
        let next_deadline = states.values().filter_map(LocalWritingState::deadline_ms).min();
        let wait = next_deadline
            .map(|deadline| {
                let remaining = deadline.saturating_sub(shared.clock.now_ms()).max(0);
                Duration::from_millis(u64::try_from(remaining).unwrap_or(0))
            })
            .unwrap_or(Duration::ZERO);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(Command::Input { conversation_id, text }) => {
                    let now_ms = shared.clock.now_ms();
                    let state = states
                        .entry(conversation_id)
                        .or_insert_with(|| LocalWritingState::new(&shared.config));
                    if let Some(activity) = state.on_input(&text, now_ms) {
                        shared.publish(conversation_id, activity, now_ms).await;
                    }
                }
                Some(Command::Reset) => {
                    debug!(conversations = states.len(), "Local writing state reset");
                    states.clear();
                }
                None => break,
            },
            _ = tokio::time::sleep(wait), if next_deadline.is_some() => {
                let now_ms = shared.clock.now_ms();
                let due: Vec<(ConversationId, WritingActivity)> = states
                    .iter_mut()
                    .filter_map(|(id, state)| state.on_deadline(now_ms).map(|a| (*id, a)))
                    .collect();
                for (conversation_id, activity) in due {
                    shared.publish(conversation_id, activity, now_ms).await;
                }
            }
        }
    }
}
