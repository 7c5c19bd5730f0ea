//! Error types for the event builder.
//! These signal caller bugs at construction time, not ledger noise.
use thiserror::Error;

/// Represents errors raised while constructing a canonical event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuilderError {
    #[error("Trust slot must be between 1 and 9, got {0}")]
    InvalidSlot(i64),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
