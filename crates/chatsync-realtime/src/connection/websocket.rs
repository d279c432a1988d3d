//! WebSocket transport to the notification hub.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use chatsync_core::config::HubConfig;
use chatsync_core::error::{AppError, ErrorKind};
use chatsync_core::events::HubPush;
use chatsync_core::result::AppResult;
use chatsync_core::types::id::ConnectionId;

use crate::message::serializer::decode_frame;
use crate::message::types::ServerFrame;

use super::transport::{HubLink, HubTransport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens hub connections over WebSocket with a bearer token header.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    /// Interval between client pings.
    keepalive: Duration,
    /// Upper bound for upgrade plus handshake frame.
    handshake_timeout: Duration,
}

impl WebSocketTransport {
    /// Creates a transport from hub settings.
    pub fn new(config: &HubConfig) -> Self {
        Self {
            keepalive: config.keepalive().max(Duration::from_secs(1)),
            handshake_timeout: config.handshake_timeout(),
        }
    }
}

#[async_trait]
impl HubTransport for WebSocketTransport {
    async fn open(&self, hub_url: &str, token: &str) -> AppResult<Box<dyn HubLink>> {
        let mut request = hub_url.into_client_request().map_err(|e| {
            AppError::with_source(
                ErrorKind::Validation,
                format!("Invalid hub URL '{hub_url}': {e}"),
                e,
            )
        })?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
            AppError::authentication(format!("Token is not a valid header value: {e}"))
        })?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let mut stream = match time::timeout(self.handshake_timeout, connect_async(request)).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return Err(map_ws_error(e)),
            Err(_) => {
                return Err(AppError::transport(format!(
                    "Hub upgrade timed out after {:?}",
                    self.handshake_timeout
                )));
            }
        };

        let connection_id = match time::timeout(self.handshake_timeout, read_handshake(&mut stream))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                let _ = stream.close(None).await;
                return Err(AppError::transport(format!(
                    "Hub handshake frame not received within {:?}",
                    self.handshake_timeout
                )));
            }
        };

        debug!(connection_id = %connection_id, "Hub handshake completed");

        Ok(Box::new(WebSocketLink::new(
            stream,
            connection_id,
            self.keepalive,
        )))
    }
}

/// Reads frames until the hub announces the connection id.
async fn read_handshake(stream: &mut WsStream) -> AppResult<ConnectionId> {
    while let Some(frame) = stream.next().await {
        match frame.map_err(map_ws_error)? {
            Message::Text(text) => match decode_frame(text.as_str())? {
                ServerFrame::Handshake { connection_id } => return Ok(connection_id),
                ServerFrame::Error { code, message } if code == "UNAUTHORIZED" => {
                    return Err(AppError::authentication(message));
                }
                other => {
                    return Err(AppError::transport(format!(
                        "Expected handshake frame, got {other:?}"
                    )));
                }
            },
            Message::Close(_) => break,
            _ => continue,
        }
    }
    Err(AppError::transport("Hub closed the connection during handshake"))
}

fn map_ws_error(err: tungstenite::Error) -> AppError {
    if let tungstenite::Error::Http(response) = &err {
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return AppError::with_source(
                ErrorKind::Authentication,
                format!("Hub rejected credentials ({status})"),
                err,
            );
        }
    }
    AppError::with_source(ErrorKind::Transport, format!("Hub transport error: {err}"), err)
}

/// Live WebSocket connection to the hub.
pub struct WebSocketLink {
    stream: WsStream,
    connection_id: ConnectionId,
    keepalive: Interval,
    closed: bool,
}

impl WebSocketLink {
    fn new(stream: WsStream, connection_id: ConnectionId, keepalive: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + keepalive, keepalive);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            stream,
            connection_id,
            keepalive: interval,
            closed: false,
        }
    }
}

#[async_trait]
impl HubLink for WebSocketLink {
    fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    async fn next_push(&mut self) -> AppResult<HubPush> {
        if self.closed {
            return Err(AppError::transport("Link already closed"));
        }
        loop {
            tokio::select! {
                _ = self.keepalive.tick() => {
                    if let Err(e) = self.stream.send(Message::Ping(Default::default())).await {
                        self.closed = true;
                        return Err(map_ws_error(e));
                    }
                }
                frame = self.stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => match decode_frame(text.as_str()) {
                        Ok(ServerFrame::Error { code, message }) => {
                            warn!(
                                connection_id = %self.connection_id,
                                code = %code,
                                "Hub reported error: {message}"
                            );
                        }
                        Ok(frame) => {
                            if let Some(push) = frame.into_push() {
                                return Ok(push);
                            }
                        }
                        Err(e) => {
                            warn!(connection_id = %self.connection_id, error = %e, "Skipping undecodable frame");
                        }
                    },
                    Some(Ok(Message::Close(close))) => {
                        self.closed = true;
                        let reason = close
                            .map(|f| format!("Hub closed connection: {} ({})", f.reason, f.code))
                            .unwrap_or_else(|| "Hub closed connection".to_string());
                        return Err(AppError::transport(reason));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        self.closed = true;
                        return Err(map_ws_error(e));
                    }
                    None => {
                        self.closed = true;
                        return Err(AppError::transport("Hub stream ended"));
                    }
                },
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            debug!(connection_id = %self.connection_id, error = %e, "Error while closing hub link");
        }
    }
}
