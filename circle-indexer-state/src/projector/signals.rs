use std::collections::BTreeMap;

use circle_indexer_shared::{EventKind, EventType, HcsEvent, SignalAction};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::ordered;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Active,
    Acknowledged,
    Revoked,
}

/// Recognition signal keyed by the eid of its create event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalState {
    pub id: String,
    pub actor: String,
    pub subject: Option<String>,
    pub label: String,
    pub category: String,
    pub description: Option<String>,
    pub issuer: Option<String>,
    pub status: SignalStatus,
    pub created_at: i64,
    pub acknowledged_at: Option<i64>,
    pub revoked_at: Option<i64>,
    pub evidence: Option<String>,
    pub metadata: Option<Value>,
    pub expires: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct SignalProjection {
    signals: BTreeMap<String, SignalState>,
}

impl SignalProjection {
    pub fn fold(&mut self, events: &[HcsEvent]) {
        for event in ordered(events, EventType::Signal) {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: &HcsEvent) {
        let EventKind::Signal(action) = event.kind else {
            return;
        };
        let ts = event.timestamp();

        if action == SignalAction::Create {
            let payload = event.signal_payload();
            self.signals.insert(
                event.eid.clone(),
                SignalState {
                    id: event.eid.clone(),
                    actor: event.actor.clone(),
                    subject: event.subject.clone(),
                    label: payload.label.unwrap_or_default(),
                    category: payload.category.unwrap_or_default(),
                    description: payload.description,
                    issuer: payload.issuer,
                    status: SignalStatus::Active,
                    created_at: ts,
                    acknowledged_at: None,
                    revoked_at: None,
                    evidence: payload.evidence,
                    metadata: payload.metadata,
                    expires: payload.expires,
                },
            );
            return;
        }

        let Some(prior) = event.prior() else {
            debug!(eid = %event.eid, "Skipping signal event without prior reference");
            return;
        };
        let Some(signal) = self.signals.get_mut(prior) else {
            debug!(eid = %event.eid, prior, "Signal event refers to unknown signal");
            return;
        };

        match action {
            SignalAction::Ack => {
                signal.status = SignalStatus::Acknowledged;
                signal.acknowledged_at = Some(ts);
            }
            SignalAction::Revoke => {
                signal.status = SignalStatus::Revoked;
                signal.revoked_at = Some(ts);
            }
            SignalAction::Create => {}
        }
    }

    /// Signals that have not been revoked, sorted by eid.
    pub fn snapshot(&self) -> Vec<SignalState> {
        self.signals
            .values()
            .filter(|s| s.status != SignalStatus::Revoked)
            .cloned()
            .collect()
    }

    pub fn get(&self, eid: &str) -> Option<&SignalState> {
        self.signals.get(eid)
    }
}
