//! Presence reconciler: merges connection lifecycle and remote status
//! pushes into the [`PresenceStore`].
//!
//! The local user's own status follows the connection only: it goes
//! `Online` on `Connected`/`Reconnected` and `Offline` on `Disconnected`.
//! Remote status events that name the local user are ignored, so a late
//! "you went offline" push from a previous connection cannot override a
//! live one.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use chatsync_core::events::{ConnectionEvent, PresenceEvent};
use chatsync_core::model::PresenceStatus;
use chatsync_core::types::id::UserId;

use super::store::PresenceStore;

#[derive(Debug, Default)]
struct LocalView {
    /// Signed-in user, if any.
    self_id: Option<UserId>,
    /// Whether the hub connection is live.
    connected: bool,
}

/// Applies presence rules to a shared store.
#[derive(Debug)]
pub struct PresenceReconciler {
    store: Arc<PresenceStore>,
    local: Mutex<LocalView>,
}

impl PresenceReconciler {
    pub fn new(store: Arc<PresenceStore>) -> Self {
        Self {
            store,
            local: Mutex::new(LocalView::default()),
        }
    }

    fn local(&self) -> MutexGuard<'_, LocalView> {
        self.local.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The store this reconciler writes to.
    pub fn store(&self) -> &Arc<PresenceStore> {
        &self.store
    }

    /// Replace the local identity.
    ///
    /// Resets every record, then re-derives the local user's status from
    /// the current connection status.
    pub fn set_identity(&self, self_id: Option<UserId>) {
        let mut local = self.local();
        local.self_id = self_id;
        self.store.clear();

        if let Some(user_id) = self_id {
            let status = if local.connected {
                PresenceStatus::Online
            } else {
                PresenceStatus::Offline
            };
            self.store.set(user_id, status);
        }
        info!(signed_in = self_id.is_some(), "Presence reset for identity change");
    }

    /// React to a connection lifecycle event.
    ///
    /// Returns `true` if the local user's record changed.
    pub fn on_connection_event(&self, event: &ConnectionEvent) -> bool {
        let mut local = self.local();
        let status = match event {
            ConnectionEvent::Connected { .. } | ConnectionEvent::Reconnected { .. } => {
                local.connected = true;
                PresenceStatus::Online
            }
            ConnectionEvent::Disconnected { .. } => {
                local.connected = false;
                PresenceStatus::Offline
            }
            // The hub still has us until recovery gives up.
            ConnectionEvent::Reconnecting { .. } => {
                local.connected = false;
                return false;
            }
        };

        let Some(user_id) = local.self_id else {
            return false;
        };
        let changed = self.store.set(user_id, status);
        if changed {
            debug!(user_id = %user_id, status = status.as_str(), "Local presence updated");
        }
        changed
    }

    /// Apply a pushed presence event.
    ///
    /// Returns `true` if a record changed.
    pub fn on_presence_event(&self, event: &PresenceEvent) -> bool {
        match event {
            PresenceEvent::UserStatusChanged { user_id, status } => {
                if self.local().self_id == Some(*user_id) {
                    debug!(user_id = %user_id, "Ignoring remote status for local user");
                    return false;
                }
                self.store.set(*user_id, *status)
            }
        }
    }
}
