//! ChatSync — real-time presence and writing-activity client
//!
//! Main entry point that wires the sync engine to a hub and logs what it
//! derives: connection lifecycle, writing indicators, and notifications.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, fmt};

use chatsync_core::config::AppConfig;
use chatsync_core::time::SystemClock;
use chatsync_core::traits::{Identity, SessionIdentity};
use chatsync_core::types::id::{ConversationId, UserId};
use chatsync_realtime::connection::WebSocketTransport;
use chatsync_realtime::notification::Notification;
use chatsync_realtime::{Collaborators, HttpHubApi, SyncEngine};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "chatsync", version, about = "Real-time chat sync client")]
struct Args {
    /// Configuration environment overlay (`config/{env}.toml`).
    #[arg(long, env = "CHATSYNC_ENV", default_value = "development")]
    env: String,

    /// Override the hub URL from configuration.
    #[arg(long)]
    hub_url: Option<String>,

    /// Bearer token of the signed-in user.
    #[arg(long, env = "CHATSYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Id of the signed-in user.
    #[arg(long, env = "CHATSYNC_USER_ID")]
    user_id: Option<UserId>,

    /// Display name of the signed-in user.
    #[arg(long, default_value = "me")]
    display_name: String,

    /// Conversations to observe.
    #[arg(long = "conversation")]
    conversations: Vec<ConversationId>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match AppConfig::load(&args.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(url) = &args.hub_url {
        config.hub.url = url.clone();
    }

    init_logging(&config);

    if let Err(e) = run(config, args).await {
        tracing::error!("Client error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main client run function
async fn run(config: AppConfig, args: Args) -> anyhow::Result<()> {
    tracing::info!("Starting ChatSync v{}", env!("CARGO_PKG_VERSION"));

    let session = Arc::new(SessionIdentity::new());
    match args.token {
        Some(token) => session.sign_in(
            Identity {
                user_id: args.user_id.unwrap_or_default(),
                display_name: args.display_name,
            },
            token,
        ),
        None => tracing::warn!("No token given; staying signed out until one is provided"),
    }

    let api = HttpHubApi::new(&config.api, session.clone()).context("HTTP API client")?;
    let engine = Arc::new(SyncEngine::new(
        &config,
        Collaborators {
            transport: Arc::new(WebSocketTransport::new(&config.hub)),
            api: Arc::new(api),
            identity: session.clone(),
            token_provider: session.clone(),
            clock: Arc::new(SystemClock),
        },
    ));

    engine.start().await.context("starting sync engine")?;

    for conversation_id in &args.conversations {
        engine
            .observe_conversation(*conversation_id)
            .await
            .with_context(|| format!("observing conversation {conversation_id}"))?;

        let mut indicator = engine.writing_indicator(*conversation_id);
        let conversation_id = *conversation_id;
        tokio::spawn(async move {
            while indicator.changed().await.is_ok() {
                let text = indicator.borrow_and_update().clone();
                tracing::info!(conversation_id = %conversation_id, indicator = %text, "Writing indicator");
            }
        });
    }

    let mut connection = engine.subscribe_connection();
    tokio::spawn(async move {
        while connection.changed().await.is_ok() {
            let state = connection.borrow_and_update().clone();
            tracing::info!(
                status = state.status.as_str(),
                reconnected = state.is_reconnected,
                "Connection state"
            );
        }
    });

    tokio::spawn(log_notifications(engine.notifications()));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    tracing::info!("Shutdown signal received");
    engine.stop().await;
    tracing::info!(metrics = ?engine.metrics(), "ChatSync stopped");

    Ok(())
}

/// Logs notifications until the engine drops the channel. Returns how many
/// were logged; lagging skips the missed ones and keeps going.
async fn log_notifications(mut notifications: broadcast::Receiver<Notification>) -> usize {
    let mut logged = 0;
    loop {
        match notifications.recv().await {
            Ok(notification) => {
                logged += 1;
                tracing::info!(
                    conversation_id = %notification.conversation_id,
                    "{}: {}",
                    notification.title,
                    notification.body
                );
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Notification logger lagged behind");
            }
            Err(RecvError::Closed) => return logged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chatsync_core::model::Message;
    use chatsync_core::types::id::MessageId;

    fn notification(text: &str) -> Notification {
        Notification::new_message(&Message {
            id: MessageId::new(),
            conversation_id: ConversationId::new(),
            user_id: UserId::new(),
            text: text.to_string(),
            created: chrono::Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_notification_logger_survives_lag() {
        let (tx, rx) = broadcast::channel(1);
        tx.send(notification("first")).unwrap();
        tx.send(notification("second")).unwrap();
        tx.send(notification("third")).unwrap();
        drop(tx);

        // Two were overwritten before the logger ran; it still logs the last.
        assert_eq!(log_notifications(rx).await, 1);
    }
}
