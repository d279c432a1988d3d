//! Notification dispatch, deduplication, and formatting.

pub mod dedup;
pub mod dispatcher;
pub mod formatter;

pub use dedup::DisplayedNotifications;
pub use dispatcher::NotificationDispatcher;
pub use formatter::Notification;
