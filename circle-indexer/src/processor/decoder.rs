//! Mirror message payload decoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use circle_indexer_shared::{parse_event, HcsEvent};
use serde_json::Value;

use crate::consumer::MirrorMessage;
use crate::errors::DecodeError;

/// Decode a mirror message into a validated event.
///
/// The payload is normally base64-encoded JSON. A payload that already starts
/// with `{` is read as raw JSON.
pub fn decode_mirror_message(message: &MirrorMessage) -> Result<HcsEvent, DecodeError> {
    let payload = message.message.trim();
    if payload.is_empty() {
        return Err(DecodeError::EmptyMessage);
    }

    let json = if payload.starts_with('{') {
        payload.to_string()
    } else {
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?
    };

    let value: Value =
        serde_json::from_str(&json).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    Ok(parse_event(&value)?)
}
