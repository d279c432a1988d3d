//! JSON serialization for hub frames.

use chatsync_core::error::AppError;

use super::types::ServerFrame;
use super::validator;

/// Validate and deserialize a server frame from JSON text.
pub fn decode_frame(text: &str) -> Result<ServerFrame, AppError> {
    validator::validate_frame(text)?;
    Ok(serde_json::from_str(text)?)
}

/// Serialize a server frame to JSON text.
pub fn encode_frame(frame: &ServerFrame) -> Result<String, AppError> {
    Ok(serde_json::to_string(frame)?)
}
