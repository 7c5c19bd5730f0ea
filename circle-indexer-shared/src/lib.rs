//! # Circle Indexer Shared
//!
//! Canonical HCS event envelope used across the circle indexer: typed event
//! kinds and payload views, envelope validation, and builders that produce
//! valid events with time-sortable ids.

pub mod builder;
pub mod errors;
pub mod types;
pub mod validation;

pub use builder::EventBuilder;
pub use errors::{BuilderError, ValidationError};
pub use types::{
    ConsensusTimestamp, ContactAction, ContactPayload, Domain, EventContext, EventKind, EventRefs,
    EventSubtype, EventType, HcsEvent, Network, SignalAction, SignalPayload, TrustAction,
    TrustPayload,
};
pub use validation::{parse_event, validate_event};
