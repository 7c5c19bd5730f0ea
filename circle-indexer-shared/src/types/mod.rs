mod envelope;
mod payload;
mod timestamp;

pub use envelope::{
    ContactAction, Domain, EventContext, EventKind, EventRefs, EventSubtype, EventType, HcsEvent,
    Network, SignalAction, TrustAction, SCHEMA_VERSION,
};
pub use payload::{into_map, ContactMetadata, ContactPayload, SignalPayload, TrustPayload};
pub use timestamp::ConsensusTimestamp;
