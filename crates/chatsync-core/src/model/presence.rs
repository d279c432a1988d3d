//! Presence status definitions.

use serde::{Deserialize, Serialize};

/// User presence status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// User has no live hub connection.
    #[default]
    Offline,
    /// User is connected.
    Online,
    /// User is connected but inactive.
    Inactive,
}

impl PresenceStatus {
    /// Parses from a string with a default fallback.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "online" => Self::Online,
            "inactive" => Self::Inactive,
            _ => Self::Offline,
        }
    }

    /// Converts to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::Inactive => "inactive",
        }
    }
}
