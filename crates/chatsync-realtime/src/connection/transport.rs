//! Transport seam between the connection manager and the hub.

use async_trait::async_trait;

use chatsync_core::events::HubPush;
use chatsync_core::result::AppResult;
use chatsync_core::types::id::ConnectionId;

/// One established hub connection.
///
/// Pushes come out of [`HubLink::next_push`] in server-send order. Links must be
/// `Sync`: the connection task holds `&self` across awaits.
#[async_trait]
pub trait HubLink: Send + Sync {
    /// Server-assigned id of this connection.
    fn connection_id(&self) -> &ConnectionId;

    /// Waits for the next push.
    ///
    /// An `Err` means the transport dropped; the link must not be used
    /// afterwards. Frames that fail to decode are skipped by the link.
    async fn next_push(&mut self) -> AppResult<HubPush>;

    /// Closes the link. Idempotent.
    async fn close(&mut self);
}

/// Opens hub connections.
#[async_trait]
pub trait HubTransport: Send + Sync + std::fmt::Debug + 'static {
    /// Performs a handshake against `hub_url` using `token` as bearer token.
    ///
    /// Fails with `Authentication` when the hub rejects the token and with
    /// `Transport` on network-level failures.
    async fn open(&self, hub_url: &str, token: &str) -> AppResult<Box<dyn HubLink>>;
}
