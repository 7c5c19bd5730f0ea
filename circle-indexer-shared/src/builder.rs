//! Constructors for canonical events.
//!
//! Each constructor stamps a fresh UUIDv7 event id. Within one process those
//! ids sort in creation order, which the projector relies on to break ties
//! between events carrying the same client timestamp.

use serde_json::Map;
use uuid::Uuid;

use crate::errors::BuilderError;
use crate::types::{
    into_map, ContactAction, ContactPayload, Domain, EventContext, EventKind, EventRefs, HcsEvent,
    Network, SignalAction, SignalPayload, TrustAction, TrustPayload,
};

pub const MIN_TRUST_SLOT: i64 = 1;
pub const MAX_TRUST_SLOT: i64 = 9;

#[derive(Debug, Clone)]
pub struct EventBuilder {
    context: EventContext,
    restamp: bool,
}

impl EventBuilder {
    /// Builder whose events carry exactly `context`, timestamp included.
    pub fn new(context: EventContext) -> Self {
        Self {
            context,
            restamp: false,
        }
    }

    /// Builder that stamps the wall clock on every event it creates.
    pub fn live(domain: Domain, network: Network) -> Self {
        Self {
            context: EventContext::now(domain, network),
            restamp: true,
        }
    }

    pub fn context(&self) -> EventContext {
        self.context
    }

    fn ctx(&self) -> EventContext {
        if self.restamp {
            EventContext::now(self.context.domain, self.context.network)
        } else {
            self.context
        }
    }

    fn build(
        &self,
        kind: EventKind,
        actor: &str,
        subject: Option<&str>,
        payload: Map<String, serde_json::Value>,
        prior: Option<&str>,
    ) -> Result<HcsEvent, BuilderError> {
        if actor.is_empty() {
            return Err(BuilderError::MissingField("actor"));
        }

        let refs = match prior {
            Some("") => return Err(BuilderError::MissingField("prior")),
            Some(prior) => Some(EventRefs {
                prior: Some(prior.to_string()),
                root: None,
            }),
            None => None,
        };

        Ok(HcsEvent {
            eid: Uuid::now_v7().to_string(),
            kind,
            actor: actor.to_string(),
            subject: subject.filter(|s| !s.is_empty()).map(str::to_string),
            ctx: self.ctx(),
            payload,
            refs,
            sig: None,
            encrypted: None,
        })
    }

    fn require_subject(subject: &str) -> Result<&str, BuilderError> {
        if subject.is_empty() {
            Err(BuilderError::MissingField("subject"))
        } else {
            Ok(subject)
        }
    }

    pub fn create_contact(
        &self,
        actor: &str,
        subject: &str,
        payload: ContactPayload,
    ) -> Result<HcsEvent, BuilderError> {
        let subject = Self::require_subject(subject)?;
        self.build(
            EventKind::Contact(ContactAction::Create),
            actor,
            Some(subject),
            into_map(&payload),
            None,
        )
    }

    /// Accept a contact request. `prior` is the eid of the create event when
    /// it is known.
    pub fn accept_contact(
        &self,
        actor: &str,
        subject: &str,
        prior: Option<&str>,
        payload: ContactPayload,
    ) -> Result<HcsEvent, BuilderError> {
        let subject = Self::require_subject(subject)?;
        self.build(
            EventKind::Contact(ContactAction::Accept),
            actor,
            Some(subject),
            into_map(&payload),
            prior,
        )
    }

    pub fn revoke_contact(
        &self,
        actor: &str,
        subject: &str,
        reason: Option<&str>,
    ) -> Result<HcsEvent, BuilderError> {
        let subject = Self::require_subject(subject)?;
        let payload = ContactPayload {
            reason: reason.map(str::to_string),
            ..Default::default()
        };
        self.build(
            EventKind::Contact(ContactAction::Revoke),
            actor,
            Some(subject),
            into_map(&payload),
            None,
        )
    }

    /// Allocate one of the actor's nine trust slots to `subject`. Any `slot`
    /// already set on `payload` is overwritten.
    pub fn allocate_trust(
        &self,
        actor: &str,
        subject: &str,
        slot: i64,
        payload: TrustPayload,
    ) -> Result<HcsEvent, BuilderError> {
        if !(MIN_TRUST_SLOT..=MAX_TRUST_SLOT).contains(&slot) {
            return Err(BuilderError::InvalidSlot(slot));
        }
        let subject = Self::require_subject(subject)?;

        let payload = TrustPayload {
            slot: Some(slot),
            ..payload
        };
        self.build(
            EventKind::Trust(TrustAction::Allocate),
            actor,
            Some(subject),
            into_map(&payload),
            None,
        )
    }

    /// Accept an allocation. `actor` is the recipient, `subject` the
    /// allocator, `prior` the allocation eid when known.
    pub fn accept_trust(
        &self,
        actor: &str,
        subject: &str,
        prior: Option<&str>,
        note: Option<&str>,
    ) -> Result<HcsEvent, BuilderError> {
        let subject = Self::require_subject(subject)?;
        let payload = TrustPayload {
            note: note.map(str::to_string),
            ..Default::default()
        };
        self.build(
            EventKind::Trust(TrustAction::Accept),
            actor,
            Some(subject),
            into_map(&payload),
            prior,
        )
    }

    pub fn withdraw_trust(
        &self,
        actor: &str,
        subject: &str,
        prior: Option<&str>,
        reason: Option<&str>,
    ) -> Result<HcsEvent, BuilderError> {
        let subject = Self::require_subject(subject)?;
        let payload = TrustPayload {
            reason: reason.map(str::to_string),
            ..Default::default()
        };
        self.build(
            EventKind::Trust(TrustAction::Withdraw),
            actor,
            Some(subject),
            into_map(&payload),
            prior,
        )
    }

    /// Issue a recognition signal. `label` and `category` are required.
    pub fn create_signal(
        &self,
        actor: &str,
        subject: Option<&str>,
        payload: SignalPayload,
    ) -> Result<HcsEvent, BuilderError> {
        if payload.label.as_deref().map_or(true, str::is_empty) {
            return Err(BuilderError::MissingField("label"));
        }
        if payload.category.as_deref().map_or(true, str::is_empty) {
            return Err(BuilderError::MissingField("category"));
        }

        self.build(
            EventKind::Signal(SignalAction::Create),
            actor,
            subject,
            into_map(&payload),
            None,
        )
    }

    pub fn ack_signal(
        &self,
        actor: &str,
        prior: &str,
        note: Option<&str>,
    ) -> Result<HcsEvent, BuilderError> {
        let payload = SignalPayload {
            note: note.map(str::to_string),
            ..Default::default()
        };
        self.build(
            EventKind::Signal(SignalAction::Ack),
            actor,
            None,
            into_map(&payload),
            Some(prior),
        )
    }

    pub fn revoke_signal(
        &self,
        actor: &str,
        prior: &str,
        reason: Option<&str>,
        authority: Option<&str>,
    ) -> Result<HcsEvent, BuilderError> {
        let payload = SignalPayload {
            reason: reason.map(str::to_string),
            authority: authority.map(str::to_string),
            ..Default::default()
        };
        self.build(
            EventKind::Signal(SignalAction::Revoke),
            actor,
            None,
            into_map(&payload),
            Some(prior),
        )
    }
}
