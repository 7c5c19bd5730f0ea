use std::collections::{BTreeMap, HashMap};

use circle_indexer_shared::{EventKind, EventType, HcsEvent, TrustAction};
use serde::Serialize;
use tracing::debug;

use super::ordered;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustStatus {
    Allocated,
    Accepted,
    Withdrawn,
}

/// Directed allocation from `actor` to `subject`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrustState {
    /// `actor|subject`, order preserved.
    pub id: String,
    pub actor: String,
    pub subject: String,
    pub slot: Option<i64>,
    pub status: TrustStatus,
    pub allocated_at: i64,
    pub accepted_at: Option<i64>,
    pub withdrawn_at: Option<i64>,
    /// Sum of every allocation weight for this pair.
    pub weight: f64,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TrustProjection {
    allocations: BTreeMap<String, TrustState>,
    /// Allocation eid to allocation key, for `refs.prior` lookups.
    by_eid: HashMap<String, String>,
}

impl TrustProjection {
    pub fn fold(&mut self, events: &[HcsEvent]) {
        for event in ordered(events, EventType::Trust) {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: &HcsEvent) {
        let EventKind::Trust(action) = event.kind else {
            return;
        };
        let ts = event.timestamp();

        match action {
            TrustAction::Allocate => {
                let Some(subject) = event.subject.as_deref() else {
                    debug!(eid = %event.eid, "Skipping trust allocation without subject");
                    return;
                };
                let key = format!("{}|{}", event.actor, subject);
                let payload = event.trust_payload();
                let weight = payload.effective_weight();

                let state = self
                    .allocations
                    .entry(key.clone())
                    .or_insert_with(|| TrustState {
                        id: key.clone(),
                        actor: event.actor.clone(),
                        subject: subject.to_string(),
                        slot: None,
                        status: TrustStatus::Allocated,
                        allocated_at: ts,
                        accepted_at: None,
                        withdrawn_at: None,
                        weight: 0.0,
                        category: None,
                    });

                state.status = TrustStatus::Allocated;
                state.allocated_at = ts;
                state.accepted_at = None;
                state.withdrawn_at = None;
                state.weight += weight;
                if payload.slot.is_some() {
                    state.slot = payload.slot;
                }
                if payload.category.is_some() {
                    state.category = payload.category;
                }

                self.by_eid.insert(event.eid.clone(), key);
            }
            TrustAction::Accept | TrustAction::Withdraw => {
                let Some(key) = self.resolve(event) else {
                    debug!(eid = %event.eid, "Trust event does not match any allocation");
                    return;
                };
                let Some(state) = self.allocations.get_mut(&key) else {
                    return;
                };

                if action == TrustAction::Accept {
                    state.status = TrustStatus::Accepted;
                    state.accepted_at = Some(ts);
                } else {
                    state.status = TrustStatus::Withdrawn;
                    state.withdrawn_at = Some(ts);
                }
            }
        }
    }

    /// Find the allocation an accept or withdraw refers to: the prior eid
    /// first, then `actor|subject`, then `subject|actor` since the acceptor
    /// is usually the recipient.
    fn resolve(&self, event: &HcsEvent) -> Option<String> {
        if let Some(key) = event.prior().and_then(|eid| self.by_eid.get(eid)) {
            return Some(key.clone());
        }

        let subject = event.subject.as_deref()?;
        [
            format!("{}|{}", event.actor, subject),
            format!("{}|{}", subject, event.actor),
        ]
        .into_iter()
        .find(|key| self.allocations.contains_key(key))
    }

    /// Allocations that have not been withdrawn, sorted by key.
    pub fn snapshot(&self) -> Vec<TrustState> {
        self.allocations
            .values()
            .filter(|t| t.status != TrustStatus::Withdrawn)
            .cloned()
            .collect()
    }

    pub fn get(&self, actor: &str, subject: &str) -> Option<&TrustState> {
        self.allocations.get(&format!("{actor}|{subject}"))
    }
}
