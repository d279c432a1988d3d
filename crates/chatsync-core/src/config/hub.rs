//! Notification hub, HTTP API, and reconnection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Notification hub (WebSocket) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Hub endpoint, e.g. `wss://chat.example.com/hubs/notifications`.
    #[serde(default = "default_hub_url")]
    pub url: String,
    /// Seconds between client keepalive pings.
    #[serde(default = "default_keepalive")]
    pub keepalive_seconds: u64,
    /// Handshake timeout in seconds.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_seconds: u64,
    /// Buffer size for internal event channels.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: default_hub_url(),
            keepalive_seconds: default_keepalive(),
            handshake_timeout_seconds: default_handshake_timeout(),
            channel_buffer_size: default_channel_buffer(),
        }
    }
}

impl HubConfig {
    /// Keepalive interval as a [`Duration`].
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_seconds)
    }

    /// Handshake timeout as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_seconds)
    }
}

/// HTTP collaborator API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API, without trailing slash.
    #[serde(default = "default_api_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Automatic reconnection schedule.
///
/// Each entry is the delay before one retry attempt. When the list is
/// exhausted the connection is considered terminally closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Whether to reconnect automatically after a dropped transport.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay before each retry attempt, in milliseconds.
    #[serde(default = "default_retry_delays")]
    pub retry_delays_ms: Vec<u64>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_delays_ms: default_retry_delays(),
        }
    }
}

impl ReconnectConfig {
    /// Delay before the given zero-based retry attempt, or `None` once the
    /// schedule is exhausted.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        self.retry_delays_ms
            .get(attempt)
            .map(|ms| Duration::from_millis(*ms))
    }
}

fn default_hub_url() -> String {
    "ws://localhost:5000/hubs/notifications".to_string()
}

fn default_api_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_keepalive() -> u64 {
    15
}

fn default_handshake_timeout() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    30
}

fn default_channel_buffer() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_retry_delays() -> Vec<u64> {
    vec![0, 2_000, 10_000, 30_000]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_schedule_exhausts() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(0), Some(Duration::ZERO));
        assert_eq!(config.delay_for_attempt(3), Some(Duration::from_secs(30)));
        assert_eq!(config.delay_for_attempt(4), None);
    }

    #[test]
    fn test_disabled_reconnect_has_no_delays() {
        let config = ReconnectConfig {
            enabled: false,
            ..ReconnectConfig::default()
        };
        assert_eq!(config.delay_for_attempt(0), None);
    }
}
