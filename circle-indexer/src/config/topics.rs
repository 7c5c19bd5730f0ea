//! HCS topic identifiers.

use std::fmt;

use crate::errors::IngestError;

/// Validated HCS topic id of the form `0.0.<digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicId(String);

impl TopicId {
    pub fn parse(raw: &str) -> Result<Self, IngestError> {
        let raw = raw.trim();
        let valid = raw
            .strip_prefix("0.0.")
            .is_some_and(|num| !num.is_empty() && num.bytes().all(|b| b.is_ascii_digit()));

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(IngestError::config(format!("Invalid topic id: {raw:?}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which class of events a topic carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    Contact,
    Trust,
    Signal,
}

impl TopicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKind::Contact => "contact",
            TopicKind::Trust => "trust",
            TopicKind::Signal => "signal",
        }
    }

    /// Environment variable holding the topic id.
    pub fn env_var(&self) -> &'static str {
        match self {
            TopicKind::Contact => "CONTACT_TOPIC_ID",
            TopicKind::Trust => "TRUST_TOPIC_ID",
            TopicKind::Signal => "SIGNAL_TOPIC_ID",
        }
    }
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub kind: TopicKind,
    pub id: TopicId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_account_style_ids() {
        assert_eq!(TopicId::parse("0.0.4567").unwrap().as_str(), "0.0.4567");
        assert_eq!(TopicId::parse(" 0.0.1 ").unwrap().as_str(), "0.0.1");
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        for raw in ["", "0.0.", "1.0.5", "0.0.12a", "0.0.-1", "topic"] {
            assert!(TopicId::parse(raw).is_err(), "{raw} should be rejected");
        }
    }
}
