//! # chatsync-realtime
//!
//! Real-time synchronization core of the ChatSync client. Provides:
//!
//! - A single hub connection with automatic, token-refreshing reconnection
//! - Group membership re-announced on every (re)connect
//! - Presence reconciliation driven by connection lifecycle and pushes
//! - Writing-activity debounce, last-write-wins merge, and windowed display
//! - Idempotent message reconciliation and deduplicated notifications

pub mod api;
pub mod connection;
pub mod engine;
pub mod membership;
pub mod message;
pub mod metrics;
pub mod notification;
pub mod presence;
pub mod reconcile;
pub mod writing;

pub use api::{HttpHubApi, HubApi};
pub use connection::manager::ConnectionManager;
pub use engine::{Collaborators, SyncEngine};
pub use notification::dispatcher::NotificationDispatcher;
pub use presence::reconciler::PresenceReconciler;
pub use reconcile::MessageStore;
