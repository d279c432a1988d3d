//! Bearer token source for hub handshakes and API calls.

use async_trait::async_trait;

use crate::result::AppResult;

/// Produces a bearer token on demand.
///
/// Called once per handshake attempt and once per API request; callers
/// never cache the result, since tokens can rotate between calls.
#[async_trait]
pub trait TokenProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Returns the current access token. An empty string means "no token".
    async fn access_token(&self) -> AppResult<String>;
}
