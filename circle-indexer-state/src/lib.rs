//! # Circle Indexer State
//!
//! Derived state for contacts, trust and recognition signals. Nothing here is
//! stored authoritatively: everything is rebuilt or incrementally updated from
//! the immutable HCS event stream.
//!
//! ## Modules
//!
//! - [`projector`]: full-history folds over an event log (audits, cold start)
//! - [`circle`]: incremental first-degree circle graph for live queries
//!
//! Neither module returns errors for data-quality issues. Events that cannot
//! be applied are skipped and logged at `debug`.

pub mod circle;
pub mod projector;

pub use circle::{
    CircleCache, CircleEdge, CircleNode, CircleQuery, CircleStats, CircleSubgraph, CircleUpdate,
    ContactUpdate, ContactUpdateAction, Subscription, TrustUpdate,
};
pub use projector::{
    fold_contacts, fold_signals, fold_trust, ContactState, ContactStatus, Projection,
    ProjectionSnapshot, SignalState, SignalStatus, TrustState, TrustStatus,
};
