//! reqwest implementation of [`HubApi`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::debug;

use chatsync_core::config::ApiConfig;
use chatsync_core::error::{AppError, ErrorKind};
use chatsync_core::model::WritingActivity;
use chatsync_core::result::AppResult;
use chatsync_core::traits::TokenProvider;
use chatsync_core::types::id::{ConnectionId, ConversationId};

use super::HubApi;

/// Body of the writing-activity PUT.
#[derive(Debug, Serialize)]
struct WritingActivityBody {
    activity: WritingActivity,
}

/// REST client for the chat API.
#[derive(Debug, Clone)]
pub struct HttpHubApi {
    client: Client,
    base_url: String,
    token_provider: Arc<dyn TokenProvider>,
}

impl HttpHubApi {
    /// Build a client from API settings.
    pub fn new(config: &ApiConfig, token_provider: Arc<dyn TokenProvider>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Failed to build HTTP client: {e}"),
                    e,
                )
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_provider,
        })
    }

    fn conversation_url(&self, conversation_id: ConversationId, suffix: &str) -> String {
        format!("{}/conversations/{}/{}", self.base_url, conversation_id, suffix)
    }

    /// Attach a fresh bearer token, send, and map the outcome.
    async fn send(&self, request: RequestBuilder, what: &str) -> AppResult<()> {
        let token = self.token_provider.access_token().await?;
        if token.trim().is_empty() {
            return Err(AppError::authentication(format!(
                "No access token available for {what}"
            )));
        }

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| map_request_error(e, what))?;

        let status = response.status();
        debug!(status = %status, "{what} answered");
        check_status(status, what)
    }
}

fn check_status(status: StatusCode, what: &str) -> AppResult<()> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::authentication(
            format!("{what} rejected credentials ({status})"),
        )),
        _ => Err(AppError::external_service(format!(
            "{what} failed with {status}"
        ))),
    }
}

fn map_request_error(err: reqwest::Error, what: &str) -> AppError {
    AppError::with_source(ErrorKind::Transport, format!("{what} failed: {err}"), err)
}

#[async_trait]
impl HubApi for HttpHubApi {
    async fn listen(
        &self,
        conversation_id: ConversationId,
        connection_id: &ConnectionId,
    ) -> AppResult<()> {
        let url = self.conversation_url(conversation_id, &format!("listen/{connection_id}"));
        self.send(self.client.post(url), "listen").await
    }

    async fn unlisten(
        &self,
        conversation_id: ConversationId,
        connection_id: &ConnectionId,
    ) -> AppResult<()> {
        let url = self.conversation_url(conversation_id, &format!("unlisten/{connection_id}"));
        self.send(self.client.post(url), "unlisten").await
    }

    async fn put_writing_activity(
        &self,
        conversation_id: ConversationId,
        activity: WritingActivity,
    ) -> AppResult<()> {
        let url = self.conversation_url(conversation_id, "writing-activity");
        let request = self.client.put(url).json(&WritingActivityBody { activity });
        self.send(request, "writing-activity update").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(check_status(StatusCode::NO_CONTENT, "listen").is_ok());
        assert_eq!(
            check_status(StatusCode::UNAUTHORIZED, "listen").unwrap_err().kind,
            ErrorKind::Authentication
        );
        assert_eq!(
            check_status(StatusCode::FORBIDDEN, "listen").unwrap_err().kind,
            ErrorKind::Authentication
        );
        assert_eq!(
            check_status(StatusCode::BAD_GATEWAY, "listen").unwrap_err().kind,
            ErrorKind::ExternalService
        );
    }

    #[test]
    fn test_urls_are_built_from_trimmed_base() {
        let api = HttpHubApi::new(
            &ApiConfig {
                base_url: "http://chat.test/api/".to_string(),
                request_timeout_seconds: 5,
            },
            Arc::new(chatsync_core::traits::SessionIdentity::new()),
        )
        .unwrap();
        let id = ConversationId::new();
        assert_eq!(
            api.conversation_url(id, "writing-activity"),
            format!("http://chat.test/api/conversations/{id}/writing-activity")
        );
    }

    #[test]
    fn test_body_uses_snake_case_activity() {
        let body = serde_json::to_string(&WritingActivityBody {
            activity: WritingActivity::IsWriting,
        })
        .unwrap();
        assert_eq!(body, r#"{"activity":"is_writing"}"#);
    }
}
