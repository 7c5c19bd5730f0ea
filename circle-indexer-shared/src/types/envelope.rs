//! Canonical HCS event envelope.
//!
//! Every message published to a contact, trust or signal topic follows this
//! envelope. Events are append-only; a later event supersedes an earlier one,
//! nothing is ever deleted.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ValidationError;

/// The only schema version currently understood.
pub const SCHEMA_VERSION: u64 = 1;

/// Top-level event class. Each class is published on its own topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Contact,
    Trust,
    Signal,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Contact => "contact",
            EventType::Trust => "trust",
            EventType::Signal => "signal",
        }
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contact" => Ok(EventType::Contact),
            "trust" => Ok(EventType::Trust),
            "signal" => Ok(EventType::Signal),
            other => Err(ValidationError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire-level subtype. Only some combinations with [`EventType`] are valid,
/// see [`EventKind::from_parts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSubtype {
    Create,
    Accept,
    Revoke,
    Ack,
    Allocate,
    Withdraw,
}

impl EventSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSubtype::Create => "create",
            EventSubtype::Accept => "accept",
            EventSubtype::Revoke => "revoke",
            EventSubtype::Ack => "ack",
            EventSubtype::Allocate => "allocate",
            EventSubtype::Withdraw => "withdraw",
        }
    }
}

impl FromStr for EventSubtype {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(EventSubtype::Create),
            "accept" => Ok(EventSubtype::Accept),
            "revoke" => Ok(EventSubtype::Revoke),
            "ack" => Ok(EventSubtype::Ack),
            "allocate" => Ok(EventSubtype::Allocate),
            "withdraw" => Ok(EventSubtype::Withdraw),
            other => Err(ValidationError::UnknownSubtype(other.to_string())),
        }
    }
}

impl fmt::Display for EventSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle steps of a bilateral contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactAction {
    Create,
    Accept,
    Revoke,
}

/// Lifecycle steps of a directed trust allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustAction {
    Allocate,
    Accept,
    Withdraw,
}

/// Lifecycle steps of a recognition signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalAction {
    Create,
    Ack,
    Revoke,
}

/// The (type, subtype) pair of an event as a single tagged variant.
///
/// Consumers match on this exhaustively, so adding a new subtype is a
/// compile error everywhere it is not handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Contact(ContactAction),
    Trust(TrustAction),
    Signal(SignalAction),
}

impl EventKind {
    /// Combine a wire type and subtype, rejecting pairs that do not exist.
    pub fn from_parts(event_type: EventType, subtype: EventSubtype) -> Option<Self> {
        use EventSubtype as S;

        let kind = match (event_type, subtype) {
            (EventType::Contact, S::Create) => EventKind::Contact(ContactAction::Create),
            (EventType::Contact, S::Accept) => EventKind::Contact(ContactAction::Accept),
            (EventType::Contact, S::Revoke) => EventKind::Contact(ContactAction::Revoke),
            (EventType::Trust, S::Allocate) => EventKind::Trust(TrustAction::Allocate),
            (EventType::Trust, S::Accept) => EventKind::Trust(TrustAction::Accept),
            (EventType::Trust, S::Withdraw) => EventKind::Trust(TrustAction::Withdraw),
            (EventType::Signal, S::Create) => EventKind::Signal(SignalAction::Create),
            (EventType::Signal, S::Ack) => EventKind::Signal(SignalAction::Ack),
            (EventType::Signal, S::Revoke) => EventKind::Signal(SignalAction::Revoke),
            _ => return None,
        };

        Some(kind)
    }

    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::Contact(_) => EventType::Contact,
            EventKind::Trust(_) => EventType::Trust,
            EventKind::Signal(_) => EventType::Signal,
        }
    }

    pub fn subtype(&self) -> EventSubtype {
        match self {
            EventKind::Contact(ContactAction::Create) => EventSubtype::Create,
            EventKind::Contact(ContactAction::Accept) => EventSubtype::Accept,
            EventKind::Contact(ContactAction::Revoke) => EventSubtype::Revoke,
            EventKind::Trust(TrustAction::Allocate) => EventSubtype::Allocate,
            EventKind::Trust(TrustAction::Accept) => EventSubtype::Accept,
            EventKind::Trust(TrustAction::Withdraw) => EventSubtype::Withdraw,
            EventKind::Signal(SignalAction::Create) => EventSubtype::Create,
            EventKind::Signal(SignalAction::Ack) => EventSubtype::Ack,
            EventKind::Signal(SignalAction::Revoke) => EventSubtype::Revoke,
        }
    }
}

/// Social domain the event was published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Social,
    Academic,
    Professional,
}

impl FromStr for Domain {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "social" => Ok(Domain::Social),
            "academic" => Ok(Domain::Academic),
            "professional" => Ok(Domain::Professional),
            _ => Err(ValidationError::IncompleteContext("domain")),
        }
    }
}

/// Hedera network the event was published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Testnet,
    Mainnet,
}

impl FromStr for Network {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "testnet" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            _ => Err(ValidationError::IncompleteContext("network")),
        }
    }
}

/// Publishing context carried by every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub domain: Domain,
    /// Client timestamp in milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub network: Network,
}

impl EventContext {
    pub fn new(domain: Domain, timestamp: i64, network: Network) -> Self {
        Self {
            domain,
            timestamp,
            network,
        }
    }

    /// Context stamped with the current wall clock.
    pub fn now(domain: Domain, network: Network) -> Self {
        Self::new(domain, Utc::now().timestamp_millis(), network)
    }
}

/// Links from an event back to the events it acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

/// A validated canonical event.
///
/// Instances can only be deserialized through the validating wire form, so a
/// value of this type always carries a supported version, non-empty ids and a
/// complete context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
pub struct HcsEvent {
    pub eid: String,
    pub kind: EventKind,
    pub actor: String,
    pub subject: Option<String>,
    pub ctx: EventContext,
    pub payload: Map<String, Value>,
    pub refs: Option<EventRefs>,
    pub sig: Option<String>,
    pub encrypted: Option<bool>,
}

impl HcsEvent {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    pub fn subtype(&self) -> EventSubtype {
        self.kind.subtype()
    }

    /// Client timestamp in milliseconds.
    pub fn timestamp(&self) -> i64 {
        self.ctx.timestamp
    }

    /// Event id this event refers back to, if any.
    pub fn prior(&self) -> Option<&str> {
        self.refs.as_ref().and_then(|r| r.prior.as_deref())
    }

    /// Fold order: client timestamp, then event id (ids are time-sortable).
    pub fn fold_key(&self) -> (i64, &str) {
        (self.ctx.timestamp, self.eid.as_str())
    }

    /// Deserialize through the wire form. Wrong JSON types surface as
    /// [`ValidationError::Malformed`], field checks as their own variants.
    pub(crate) fn from_json(raw: &Value) -> Result<HcsEvent, ValidationError> {
        let wire = WireEvent::deserialize(raw).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        HcsEvent::try_from(wire)
    }

    /// Serialize to the JSON wire form.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Raw wire shape, every field optional so validation can name what is wrong.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct WireEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eid: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctx: Option<WireContext>,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<EventRefs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct WireContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField(field))
}

impl TryFrom<WireEvent> for HcsEvent {
    type Error = ValidationError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        match wire.v {
            Some(SCHEMA_VERSION) => {}
            Some(other) => return Err(ValidationError::UnsupportedVersion(other.to_string())),
            None => return Err(ValidationError::MissingField("v")),
        }

        let eid = required(wire.eid, "eid")?;
        let raw_type = required(wire.event_type, "type")?;
        let raw_subtype = required(wire.subtype, "subtype")?;
        let actor = required(wire.actor, "actor")?;
        let ctx = wire.ctx.ok_or(ValidationError::MissingField("ctx"))?;

        let event_type: EventType = raw_type.parse()?;
        let subtype: EventSubtype = raw_subtype.parse()?;
        let kind = EventKind::from_parts(event_type, subtype).ok_or_else(|| {
            ValidationError::SubtypeMismatch {
                event_type: raw_type.clone(),
                subtype: raw_subtype.clone(),
            }
        })?;

        let domain: Domain = ctx
            .domain
            .as_deref()
            .ok_or(ValidationError::IncompleteContext("domain"))?
            .parse()?;
        let timestamp = ctx
            .timestamp
            .filter(|ts| *ts > 0)
            .ok_or(ValidationError::IncompleteContext("timestamp"))?;
        let network: Network = ctx
            .network
            .as_deref()
            .ok_or(ValidationError::IncompleteContext("network"))?
            .parse()?;

        Ok(HcsEvent {
            eid,
            kind,
            actor,
            subject: wire.subject.filter(|s| !s.is_empty()),
            ctx: EventContext {
                domain,
                timestamp,
                network,
            },
            payload: wire.payload,
            refs: wire.refs,
            sig: wire.sig,
            encrypted: wire.encrypted,
        })
    }
}

impl From<HcsEvent> for WireEvent {
    fn from(event: HcsEvent) -> Self {
        let domain = match event.ctx.domain {
            Domain::Social => "social",
            Domain::Academic => "academic",
            Domain::Professional => "professional",
        };
        let network = match event.ctx.network {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        };

        WireEvent {
            v: Some(SCHEMA_VERSION),
            eid: Some(event.eid),
            event_type: Some(event.kind.event_type().as_str().to_string()),
            subtype: Some(event.kind.subtype().as_str().to_string()),
            actor: Some(event.actor),
            subject: event.subject,
            ctx: Some(WireContext {
                domain: Some(domain.to_string()),
                timestamp: Some(event.ctx.timestamp),
                network: Some(network.to_string()),
            }),
            payload: event.payload,
            refs: event.refs,
            sig: event.sig,
            encrypted: event.encrypted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_rejects_foreign_subtype() {
        assert!(EventKind::from_parts(EventType::Contact, EventSubtype::Allocate).is_none());
        assert!(EventKind::from_parts(EventType::Signal, EventSubtype::Withdraw).is_none());
        assert!(EventKind::from_parts(EventType::Trust, EventSubtype::Ack).is_none());
    }

    #[test]
    fn test_kind_parts_are_consistent() {
        let kind = EventKind::from_parts(EventType::Trust, EventSubtype::Allocate).unwrap();
        assert_eq!(kind, EventKind::Trust(TrustAction::Allocate));
        assert_eq!(kind.event_type(), EventType::Trust);
        assert_eq!(kind.subtype(), EventSubtype::Allocate);
    }

    #[test]
    fn test_deserialize_and_serialize_wire_keys() {
        let raw = json!({
            "v": 1,
            "eid": "01HZX",
            "type": "contact",
            "subtype": "accept",
            "actor": "0.0.111",
            "subject": "0.0.222",
            "ctx": { "domain": "social", "timestamp": 1_700_000_000_000i64, "network": "testnet" },
            "payload": { "handle": "alice" },
            "refs": { "prior": "01HZW" }
        });

        let event: HcsEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.kind, EventKind::Contact(ContactAction::Accept));
        assert_eq!(event.prior(), Some("01HZW"));

        let back = event.to_value();
        assert_eq!(back["type"], "contact");
        assert_eq!(back["subtype"], "accept");
        assert_eq!(back["ctx"]["domain"], "social");
        assert_eq!(back["v"], 1);
        assert!(back.get("sig").is_none());
    }

    #[test]
    fn test_empty_subject_is_treated_as_absent() {
        let raw = json!({
            "v": 1,
            "eid": "e1",
            "type": "signal",
            "subtype": "create",
            "actor": "0.0.1",
            "subject": "",
            "ctx": { "domain": "academic", "timestamp": 5, "network": "mainnet" },
            "payload": { "label": "Mentor", "category": "academic" }
        });

        let event: HcsEvent = serde_json::from_value(raw).unwrap();
        assert!(event.subject.is_none());
    }
}
