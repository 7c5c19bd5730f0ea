//! Error types for envelope validation.
//! Describes why an inbound message was rejected as a canonical event.
use thiserror::Error;

/// Represents the reasons a raw message fails envelope validation.
///
/// Validation failures are data-quality issues: callers log and drop the
/// message, they never abort a stream because of one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Event is not a JSON object")]
    NotAnObject,
    #[error("Unsupported schema version: {0}")]
    UnsupportedVersion(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Unknown event type: {0}")]
    UnknownType(String),
    #[error("Unknown event subtype: {0}")]
    UnknownSubtype(String),
    #[error("Subtype {subtype} is not valid for type {event_type}")]
    SubtypeMismatch { event_type: String, subtype: String },
    #[error("Incomplete context: {0}")]
    IncompleteContext(&'static str),
    #[error("Malformed event: {0}")]
    Malformed(String),
}
