//! User presence: store and reconciliation rules.

pub mod reconciler;
pub mod store;

pub use reconciler::PresenceReconciler;
pub use store::PresenceStore;
