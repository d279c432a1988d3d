//! HTTP collaborator API used for group membership and writing activity.
//!
//! The hub connection only pushes; everything the client tells the server
//! goes through [`HubApi`].

pub mod http;
pub mod recording;

use async_trait::async_trait;

use chatsync_core::model::WritingActivity;
use chatsync_core::result::AppResult;
use chatsync_core::types::id::{ConnectionId, ConversationId};

pub use http::HttpHubApi;
pub use recording::{ApiCall, RecordingHubApi};

/// Client-to-server calls the synchronization core depends on.
#[async_trait]
pub trait HubApi: Send + Sync + std::fmt::Debug + 'static {
    /// Route pushes for `conversation_id` to `connection_id`.
    async fn listen(
        &self,
        conversation_id: ConversationId,
        connection_id: &ConnectionId,
    ) -> AppResult<()>;

    /// Stop routing pushes for `conversation_id` to `connection_id`.
    async fn unlisten(
        &self,
        conversation_id: ConversationId,
        connection_id: &ConnectionId,
    ) -> AppResult<()>;

    /// Publish the local user's writing activity in `conversation_id`.
    async fn put_writing_activity(
        &self,
        conversation_id: ConversationId,
        activity: WritingActivity,
    ) -> AppResult<()>;
}
