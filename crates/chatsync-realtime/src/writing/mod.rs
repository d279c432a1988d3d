//! Writing-activity aggregation: outbound debounce and inbound display.

pub mod broadcaster;
pub mod indicator;
pub mod local;
pub mod store;

pub use broadcaster::WritingBroadcaster;
pub use indicator::{WritingDisplay, format_writing, writing_names};
pub use local::LocalWritingState;
pub use store::{WritingActivityStore, WritingSnapshot};
