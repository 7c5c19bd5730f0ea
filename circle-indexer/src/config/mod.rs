//! Configuration and dependency initialization.

mod dependencies;
mod settings;
mod topics;

pub use dependencies::Dependencies;
pub use settings::{ReconnectConfig, SyncConfig};
pub use topics::{TopicConfig, TopicId, TopicKind};
