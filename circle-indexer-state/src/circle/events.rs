//! Inputs to the circle cache.

use circle_indexer_shared::{ContactAction, EventKind, HcsEvent, TrustAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactUpdateAction {
    Accept,
    Revoke,
}

/// Contact bond change between `actor` and `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactUpdate {
    pub action: ContactUpdateAction,
    pub actor: String,
    pub target: Option<String>,
    /// Event time in milliseconds.
    pub ts: i64,
    /// Display handle the actor published with this event.
    pub handle: Option<String>,
}

/// Trust allocated from `actor` to `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustUpdate {
    pub actor: String,
    pub target: Option<String>,
    pub ts: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CircleUpdate {
    Contact(ContactUpdate),
    Trust(TrustUpdate),
}

impl CircleUpdate {
    /// Map a canonical event onto a cache update. Only contact accept and
    /// revoke and trust allocate affect the circle graph.
    pub fn from_event(event: &HcsEvent) -> Option<Self> {
        let action = match event.kind {
            EventKind::Contact(ContactAction::Accept) => ContactUpdateAction::Accept,
            EventKind::Contact(ContactAction::Revoke) => ContactUpdateAction::Revoke,
            EventKind::Trust(TrustAction::Allocate) => {
                return Some(CircleUpdate::Trust(TrustUpdate {
                    actor: event.actor.clone(),
                    target: event.subject.clone(),
                    ts: event.timestamp(),
                    amount: event.trust_payload().effective_weight(),
                }));
            }
            EventKind::Contact(ContactAction::Create)
            | EventKind::Trust(TrustAction::Accept | TrustAction::Withdraw)
            | EventKind::Signal(_) => return None,
        };

        let payload = event.contact_payload();
        Some(CircleUpdate::Contact(ContactUpdate {
            action,
            actor: event.actor.clone(),
            target: event.subject.clone(),
            ts: event.timestamp(),
            handle: payload.handle.or(payload.name),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circle_indexer_shared::{
        ContactPayload, Domain, EventBuilder, EventContext, Network, TrustPayload,
    };

    fn builder() -> EventBuilder {
        EventBuilder::new(EventContext::new(Domain::Social, 42, Network::Testnet))
    }

    #[test]
    fn test_accept_maps_to_contact_update() {
        let event = builder()
            .accept_contact(
                "0.0.1",
                "0.0.2",
                None,
                ContactPayload {
                    name: Some("Alice".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(
            CircleUpdate::from_event(&event),
            Some(CircleUpdate::Contact(ContactUpdate {
                action: ContactUpdateAction::Accept,
                actor: "0.0.1".into(),
                target: Some("0.0.2".into()),
                ts: 42,
                handle: Some("Alice".into()),
            }))
        );
    }

    #[test]
    fn test_allocate_maps_weight_to_amount() {
        let event = builder()
            .allocate_trust(
                "0.0.1",
                "0.0.2",
                2,
                TrustPayload {
                    weight: Some(3.0),
                    ..Default::default()
                },
            )
            .unwrap();

        match CircleUpdate::from_event(&event) {
            Some(CircleUpdate::Trust(update)) => assert_eq!(update.amount, 3.0),
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[test]
    fn test_other_kinds_are_ignored() {
        let b = builder();
        let create = b.create_contact("0.0.1", "0.0.2", ContactPayload::default()).unwrap();
        let withdraw = b.withdraw_trust("0.0.1", "0.0.2", None, None).unwrap();

        assert!(CircleUpdate::from_event(&create).is_none());
        assert!(CircleUpdate::from_event(&withdraw).is_none());
    }
}
