//! Signed-in identity and change notification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::result::AppResult;
use crate::types::id::UserId;

use super::token::TokenProvider;

/// The locally signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User ID.
    pub user_id: UserId,
    /// Display name.
    pub display_name: String,
}

/// Exposes the signed-in identity and notifies on sign-in / sign-out.
pub trait IdentityProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Currently signed-in identity, if any.
    fn current(&self) -> Option<Identity>;

    /// Receiver that changes whenever the identity changes.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    /// Whether someone is signed in.
    fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }
}

/// In-process identity holder fed by the embedding application.
///
/// Serves as both [`IdentityProvider`] and [`TokenProvider`]: the
/// application calls [`SessionIdentity::sign_in`] after its own login flow
/// and [`SessionIdentity::set_token`] whenever it refreshes the token.
#[derive(Debug)]
pub struct SessionIdentity {
    identity: watch::Sender<Option<Identity>>,
    token: watch::Sender<String>,
}

impl SessionIdentity {
    /// Create a signed-out holder.
    pub fn new() -> Self {
        let (identity, _) = watch::channel(None);
        let (token, _) = watch::channel(String::new());
        Self { identity, token }
    }

    /// Sign in with the given identity and token.
    pub fn sign_in(&self, identity: Identity, token: impl Into<String>) {
        self.token.send_replace(token.into());
        self.identity.send_replace(Some(identity));
    }

    /// Sign out and forget the token.
    pub fn sign_out(&self) {
        self.token.send_replace(String::new());
        self.identity.send_replace(None);
    }

    /// Replace the token without changing the identity.
    pub fn set_token(&self, token: impl Into<String>) {
        self.token.send_replace(token.into());
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for SessionIdentity {
    fn current(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }
}

#[async_trait]
impl TokenProvider for SessionIdentity {
    async fn access_token(&self) -> AppResult<String> {
        Ok(self.token.borrow().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann() -> Identity {
        Identity {
            user_id: UserId::new(),
            display_name: "Ann".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let session = SessionIdentity::new();
        assert!(!session.is_authenticated());
        assert_eq!(session.access_token().await.unwrap(), "");

        let identity = ann();
        session.sign_in(identity.clone(), "token-1");
        assert_eq!(session.current(), Some(identity));
        assert_eq!(session.access_token().await.unwrap(), "token-1");

        session.sign_out();
        assert!(!session.is_authenticated());
        assert_eq!(session.access_token().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let session = SessionIdentity::new();
        let mut rx = session.subscribe();
        session.sign_in(ann(), "t");
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_some());
    }
}
