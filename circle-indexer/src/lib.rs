//! # Circle Indexer
//!
//! Mirror sync service for the circle of trust - backfills and tails HCS
//! topics from a Hedera mirror node and materializes the contact and trust
//! graph.
//!
//! ## Architecture
//!
//! The indexer follows the Consumer-Processor-Loader pattern:
//!
//! 1. **Consumer**: Backfills topics over REST and tails them over WebSocket
//! 2. **Processor**: Decodes payloads into canonical events and drops duplicates
//! 3. **Loader**: Applies events to the circle cache and keeps the event log
//! 4. **Orchestrator**: Coordinates the ingest flow
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`consumer`]: Mirror node REST and WebSocket clients
//! - [`processor`]: Decodes mirror messages into events
//! - [`loader`]: Feeds the circle cache
//! - [`orchestrator`]: Coordinates the ingest flow
//! - [`errors`]: Error types for the indexer

pub mod config;
pub mod consumer;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod processor;

pub use config::Dependencies;
pub use errors::{DecodeError, IngestError};

use thiserror::Error;

/// Top-level failure of the `circle-indexer` binary.
///
/// Per-message problems never surface here; they are counted in topic stats.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Bad mirror URL, unusable environment value, or logging set up twice.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Mirror sync stopped with an error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),
}

impl IndexingError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
