//! Conversation domain model shared by the hub protocol and the stores.

pub mod message;
pub mod presence;
pub mod writing;

pub use message::Message;
pub use presence::PresenceStatus;
pub use writing::{WritingActivity, WritingActivityRecord};
