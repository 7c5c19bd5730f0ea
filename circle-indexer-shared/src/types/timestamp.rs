//! Mirror node consensus timestamps.
//!
//! The mirror reports consensus time as a `"<seconds>.<nanos>"` string. Parsing
//! into a pair of integers keeps ordering exact, which a float would not.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ValidationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsensusTimestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl ConsensusTimestamp {
    pub const ZERO: ConsensusTimestamp = ConsensusTimestamp { seconds: 0, nanos: 0 };

    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Milliseconds since the Unix epoch, truncating sub-millisecond precision.
    pub fn to_millis(&self) -> i64 {
        self.seconds * 1_000 + i64::from(self.nanos / 1_000_000)
    }
}

impl FromStr for ConsensusTimestamp {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ValidationError::Malformed(format!("invalid consensus timestamp: {s}"));

        let (secs, frac) = match s.split_once('.') {
            Some((secs, frac)) => (secs, frac),
            None => (s, ""),
        };

        if secs.is_empty() || frac.len() > 9 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }

        let seconds: i64 = secs.parse().map_err(|_| malformed())?;
        let nanos: u32 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<9}").parse().map_err(|_| malformed())?
        };

        Ok(Self { seconds, nanos })
    }
}

impl fmt::Display for ConsensusTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl Serialize for ConsensusTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConsensusTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pads_fraction() {
        let ts: ConsensusTimestamp = "1700000000.5".parse().unwrap();
        assert_eq!(ts, ConsensusTimestamp::new(1_700_000_000, 500_000_000));
        assert_eq!(ts.to_string(), "1700000000.500000000");
        assert_eq!(ts.to_millis(), 1_700_000_000_500);
    }

    #[test]
    fn test_ordering_is_numeric() {
        let a: ConsensusTimestamp = "9.999999999".parse().unwrap();
        let b: ConsensusTimestamp = "10.000000001".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("".parse::<ConsensusTimestamp>().is_err());
        assert!("abc.12".parse::<ConsensusTimestamp>().is_err());
        assert!("12.1234567890".parse::<ConsensusTimestamp>().is_err());
        assert!("12.-1".parse::<ConsensusTimestamp>().is_err());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let ts = ConsensusTimestamp::new(12, 34);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"12.000000034\"");
        let back: ConsensusTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
