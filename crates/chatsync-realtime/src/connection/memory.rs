//! In-memory hub transport for single-process use and tests.
//!
//! [`MemoryTransport`] plays the hub side: it issues connection ids,
//! delivers pushes to the current link, and can drop the link or fail
//! upcoming handshakes on demand.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use chatsync_core::error::AppError;
use chatsync_core::events::HubPush;
use chatsync_core::result::AppResult;
use chatsync_core::types::id::ConnectionId;

use super::transport::{HubLink, HubTransport};

/// Commands delivered to a memory link.
#[derive(Debug)]
enum LinkCommand {
    Push(HubPush),
    Drop(String),
}

#[derive(Debug, Default)]
struct MemoryHubState {
    /// Monotonic counter for connection ids.
    issued: u64,
    /// Sender of the most recently opened link.
    current: Option<mpsc::UnboundedSender<LinkCommand>>,
    /// Errors returned by the next handshakes, in order.
    failures: VecDeque<AppError>,
    /// Tokens presented on every handshake attempt.
    tokens: Vec<String>,
}

/// In-memory hub. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryHubState>>,
}

impl MemoryTransport {
    /// Create a hub with no open links.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryHubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver a push to the current link. Returns `false` if no link is open.
    pub fn push(&self, push: impl Into<HubPush>) -> bool {
        let state = self.lock();
        match &state.current {
            Some(tx) => tx.send(LinkCommand::Push(push.into())).is_ok(),
            None => false,
        }
    }

    /// Drop the current link as if the network failed.
    pub fn drop_link(&self, reason: &str) -> bool {
        let mut state = self.lock();
        match state.current.take() {
            Some(tx) => tx.send(LinkCommand::Drop(reason.to_string())).is_ok(),
            None => false,
        }
    }

    /// Make the next handshake fail with `error`.
    pub fn fail_next_handshake(&self, error: AppError) {
        self.lock().failures.push_back(error);
    }

    /// Number of handshake attempts seen so far.
    pub fn handshake_attempts(&self) -> usize {
        self.lock().tokens.len()
    }

    /// Tokens presented on each handshake attempt.
    pub fn tokens_seen(&self) -> Vec<String> {
        self.lock().tokens.clone()
    }

    /// Whether a link is currently open.
    pub fn has_open_link(&self) -> bool {
        self.lock()
            .current
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

#[async_trait]
impl HubTransport for MemoryTransport {
    async fn open(&self, _hub_url: &str, token: &str) -> AppResult<Box<dyn HubLink>> {
        let mut state = self.lock();
        state.tokens.push(token.to_string());
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }

        state.issued += 1;
        let connection_id = ConnectionId::new(format!("mem-{}", state.issued));
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(previous) = state.current.replace(tx) {
            let _ = previous.send(LinkCommand::Drop("superseded".to_string()));
        }

        Ok(Box::new(MemoryLink { connection_id, rx }))
    }
}

/// Link end of a [`MemoryTransport`] connection.
#[derive(Debug)]
pub struct MemoryLink {
    connection_id: ConnectionId,
    rx: mpsc::UnboundedReceiver<LinkCommand>,
}

#[async_trait]
impl HubLink for MemoryLink {
    fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    async fn next_push(&mut self) -> AppResult<HubPush> {
        match self.rx.recv().await {
            Some(LinkCommand::Push(push)) => Ok(push),
            Some(LinkCommand::Drop(reason)) => Err(AppError::transport(reason)),
            None => Err(AppError::transport("Memory hub went away")),
        }
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}
