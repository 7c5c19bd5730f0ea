use std::collections::BTreeMap;

use circle_indexer_shared::{ContactAction, EventKind, EventType, HcsEvent};
use serde::Serialize;
use tracing::debug;

use super::ordered;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Pending,
    Bonded,
    Revoked,
}

/// One record per unordered account pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactState {
    /// Sorted pair joined with `|`.
    pub id: String,
    /// Account that requested the contact.
    pub actor: String,
    /// Account that was asked to accept.
    pub subject: String,
    pub status: ContactStatus,
    pub created_at: i64,
    pub accepted_at: Option<i64>,
    pub revoked_at: Option<i64>,
    pub actor_handle: Option<String>,
    pub subject_handle: Option<String>,
    pub notes: Vec<String>,
    /// Event id referenced by the accepting event.
    pub prior: Option<String>,
}

/// Direction-independent key for a contact pair.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContactProjection {
    contacts: BTreeMap<String, ContactState>,
}

impl ContactProjection {
    pub fn fold(&mut self, events: &[HcsEvent]) {
        for event in ordered(events, EventType::Contact) {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: &HcsEvent) {
        let EventKind::Contact(action) = event.kind else {
            return;
        };
        let Some(subject) = event.subject.as_deref() else {
            debug!(eid = %event.eid, "Skipping contact event without subject");
            return;
        };

        let key = pair_key(&event.actor, subject);
        let payload = event.contact_payload();
        let handle = payload.handle.or(payload.name);
        let ts = event.timestamp();

        match action {
            ContactAction::Create => match self.contacts.get_mut(&key) {
                Some(existing) if existing.status != ContactStatus::Revoked => {
                    existing.notes.extend(payload.note);
                }
                _ => {
                    self.contacts.insert(
                        key.clone(),
                        ContactState {
                            id: key,
                            actor: event.actor.clone(),
                            subject: subject.to_string(),
                            status: ContactStatus::Pending,
                            created_at: ts,
                            accepted_at: None,
                            revoked_at: None,
                            actor_handle: handle,
                            subject_handle: None,
                            notes: payload.note.into_iter().collect(),
                            prior: None,
                        },
                    );
                }
            },
            ContactAction::Accept => match self.contacts.get_mut(&key) {
                Some(existing) => {
                    existing.status = ContactStatus::Bonded;
                    existing.accepted_at = Some(ts);
                    if handle.is_some() {
                        existing.subject_handle = handle;
                    }
                    existing.notes.extend(payload.note);
                    existing.prior = event.prior().map(str::to_string);
                }
                None => {
                    // The acceptor is the subject of the missing request.
                    self.contacts.insert(
                        key.clone(),
                        ContactState {
                            id: key,
                            actor: subject.to_string(),
                            subject: event.actor.clone(),
                            status: ContactStatus::Bonded,
                            created_at: ts,
                            accepted_at: Some(ts),
                            revoked_at: None,
                            actor_handle: None,
                            subject_handle: handle,
                            notes: payload.note.into_iter().collect(),
                            prior: event.prior().map(str::to_string),
                        },
                    );
                }
            },
            ContactAction::Revoke => match self.contacts.get_mut(&key) {
                Some(existing) => {
                    existing.status = ContactStatus::Revoked;
                    existing.revoked_at = Some(ts);
                    if let Some(reason) = payload.reason {
                        existing.notes.push(format!("Revoked: {reason}"));
                    }
                }
                None => debug!(eid = %event.eid, pair = %key, "Revoke for unknown contact"),
            },
        }
    }

    /// Non-revoked contacts sorted by pair key.
    pub fn snapshot(&self) -> Vec<ContactState> {
        self.contacts
            .values()
            .filter(|c| c.status != ContactStatus::Revoked)
            .cloned()
            .collect()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<&ContactState> {
        self.contacts.get(&pair_key(a, b))
    }

    /// Bonded pairs as `(lower, higher)` account ids.
    pub fn bonded_pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.contacts
            .values()
            .filter(|c| c.status == ContactStatus::Bonded)
            .map(|c| {
                if c.actor <= c.subject {
                    (c.actor.clone(), c.subject.clone())
                } else {
                    (c.subject.clone(), c.actor.clone())
                }
            })
    }
}
