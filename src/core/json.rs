/*!
 * JSON Codec
 * Typed serde_json helpers for options and configuration blobs
 */

use super::status::{CoreResult, ErrorModule, Status, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::Path;

fn json_status(code: StatusCode, message: impl Into<String>, detail_id: u32) -> Status {
    Status::with_module(code, message, ErrorModule::Json, detail_id)
}

/// Serialize to a JSON string
pub fn to_string<T: Serialize>(value: &T) -> CoreResult<String> {
    serde_json::to_string(value)
        .map_err(|e| json_status(StatusCode::InternalError, format!("json encode failed: {}", e), 0))
}

/// Serialize to a pretty-printed JSON string
pub fn to_string_pretty<T: Serialize>(value: &T) -> CoreResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| json_status(StatusCode::InternalError, format!("json encode failed: {}", e), 0))
}

/// Serialize to JSON bytes
pub fn to_vec<T: Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| json_status(StatusCode::InternalError, format!("json encode failed: {}", e), 0))
}

/// Decode a value from JSON text
pub fn from_str<T: DeserializeOwned>(text: &str) -> CoreResult<T> {
    serde_json::from_str(text)
        .map_err(|e| json_status(StatusCode::InvalidArgument, format!("json parse failed: {}", e), 0x0001))
}

/// Decode a value from JSON bytes
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| json_status(StatusCode::InvalidArgument, format!("json parse failed: {}", e), 0x0001))
}

/// Decode a value from a JSON file
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> CoreResult<T> {
    let text = fs::read_to_string(path.as_ref())
        .map_err(|_| json_status(StatusCode::NotFound, "json file not found", 0))?;
    from_str(&text)
}

/// Write a value to a JSON file, pretty-printed with a trailing newline
pub fn save_file<T: Serialize>(path: impl AsRef<Path>, value: &T) -> CoreResult<()> {
    let mut text = to_string_pretty(value)?;
    text.push('\n');
    fs::write(path.as_ref(), text)
        .map_err(|e| json_status(StatusCode::IoError, format!("json write failed: {}", e), 0))
}
