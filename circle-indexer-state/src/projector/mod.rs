//! Full-history state folder.
//!
//! Rebuilds contact, trust and signal state from an ordered event log. Each
//! fold filters its event type, orders by `(ctx.timestamp, eid)` and reduces
//! into a map keyed by the canonical key. Snapshots drop terminal records and
//! come back sorted by key, so folding the same log twice yields identical
//! output.

mod contacts;
mod signals;
mod trust;

use std::collections::BTreeSet;

use circle_indexer_shared::{EventType, HcsEvent};
use serde::Serialize;

pub use contacts::{pair_key, ContactProjection, ContactState, ContactStatus};
pub use signals::{SignalProjection, SignalState, SignalStatus};
pub use trust::{TrustProjection, TrustState, TrustStatus};

/// Events of one type in fold order.
pub(crate) fn ordered(events: &[HcsEvent], event_type: EventType) -> Vec<&HcsEvent> {
    let mut selected: Vec<&HcsEvent> = events
        .iter()
        .filter(|e| e.event_type() == event_type)
        .collect();
    selected.sort_by(|a, b| a.fold_key().cmp(&b.fold_key()));
    selected
}

pub fn fold_contacts(events: &[HcsEvent]) -> Vec<ContactState> {
    let mut projection = ContactProjection::default();
    projection.fold(events);
    projection.snapshot()
}

pub fn fold_trust(events: &[HcsEvent]) -> Vec<TrustState> {
    let mut projection = TrustProjection::default();
    projection.fold(events);
    projection.snapshot()
}

pub fn fold_signals(events: &[HcsEvent]) -> Vec<SignalState> {
    let mut projection = SignalProjection::default();
    projection.fold(events);
    projection.snapshot()
}

/// Point-in-time view of all three projections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionSnapshot {
    pub contacts: Vec<ContactState>,
    pub trust: Vec<TrustState>,
    pub signals: Vec<SignalState>,
}

/// The three projections folded together.
///
/// Suitable for incremental use: folding a prefix and then a suffix whose
/// events all sort after the prefix gives the same state as folding the whole
/// log at once.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub contacts: ContactProjection,
    pub trust: TrustProjection,
    pub signals: SignalProjection,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, events: &[HcsEvent]) {
        self.contacts.fold(events);
        self.trust.fold(events);
        self.signals.fold(events);
    }

    pub fn snapshot(&self) -> ProjectionSnapshot {
        ProjectionSnapshot {
            contacts: self.contacts.snapshot(),
            trust: self.trust.snapshot(),
            signals: self.signals.snapshot(),
        }
    }

    /// Bonded unordered pairs as `(lower, higher)` account ids.
    pub fn bonded_pairs(&self) -> BTreeSet<(String, String)> {
        self.contacts.bonded_pairs().collect()
    }
}
