//! Error types for the circle indexer ingest.

use circle_indexer_shared::ValidationError;
use thiserror::Error;

/// Reasons a mirror message could not be turned into a canonical event.
///
/// Decode failures are counted and the message is dropped; they never stop a
/// topic stream.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The mirror message carried no payload.
    #[error("Mirror message has no payload")]
    EmptyMessage,

    /// Payload was neither raw JSON nor valid base64.
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    /// Decoded bytes were not UTF-8.
    #[error("Payload is not valid UTF-8")]
    InvalidUtf8,

    /// Payload was not parseable JSON.
    #[error("Invalid JSON payload: {0}")]
    InvalidJson(String),

    /// JSON parsed but is not a valid canonical event.
    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors that can occur in the circle indexer ingest.
#[derive(Error, Debug)]
pub enum IngestError {
    /// REST or WebSocket failure talking to the mirror node.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Invalid configuration value.
    #[error("Config error: {0}")]
    ConfigError(String),
}

impl IngestError {
    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        Self::TransportError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for IngestError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::TransportError(err.to_string())
    }
}

impl From<url::ParseError> for IngestError {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
