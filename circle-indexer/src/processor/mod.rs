//! Processor module for the circle indexer ingest.
//!
//! Turns mirror messages into validated canonical events.

mod decoder;
mod message_processor;

pub use decoder::decode_mirror_message;
pub use message_processor::{MessageProcessor, TopicStats};
