//! Client configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod hub;
pub mod logging;
pub mod writing;

use serde::{Deserialize, Serialize};

pub use self::hub::{ApiConfig, HubConfig, ReconnectConfig};
pub use self::logging::LoggingConfig;
pub use self::writing::WritingConfig;

use crate::error::AppError;

/// Root client configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Notification hub settings.
    #[serde(default)]
    pub hub: HubConfig,
    /// HTTP collaborator API settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Automatic reconnection settings.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Writing-activity timing settings.
    #[serde(default)]
    pub writing: WritingConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `CHATSYNC__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CHATSYNC")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("reconnect.retry_delays_ms"),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Checks cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.writing.poll_interval_ms == 0 {
            return Err(AppError::configuration(
                "writing.poll_interval_ms must be greater than zero",
            ));
        }
        if self.hub.channel_buffer_size == 0 {
            return Err(AppError::configuration(
                "hub.channel_buffer_size must be greater than zero",
            ));
        }
        Ok(())
    }
}
