//! Envelope validation.
//!
//! Everything read off a mirror topic goes through [`parse_event`] before it
//! reaches the projector or the circle cache. Invalid input is reported as a
//! [`ValidationError`], never a panic.

use serde_json::Value;

use crate::errors::ValidationError;
use crate::types::HcsEvent;

/// Parse a raw JSON value into a validated event.
///
/// Returns the first problem found, in envelope field order.
pub fn parse_event(raw: &Value) -> Result<HcsEvent, ValidationError> {
    if !raw.is_object() {
        return Err(ValidationError::NotAnObject);
    }

    HcsEvent::from_json(raw)
}

/// Whether `raw` is a well-formed event.
pub fn validate_event(raw: &Value) -> bool {
    parse_event(raw).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "v": 1,
            "eid": "0190b7c2-0000-7000-8000-000000000001",
            "type": "contact",
            "subtype": "create",
            "actor": "0.0.111",
            "subject": "0.0.222",
            "ctx": { "domain": "social", "timestamp": 1_700_000_000_000i64, "network": "testnet" },
            "payload": { "handle": "alice" }
        })
    }

    fn with(mut value: Value, path: &[&str], replacement: Value) -> Value {
        let mut cursor = &mut value;
        for key in &path[..path.len() - 1] {
            cursor = cursor.get_mut(*key).unwrap();
        }
        cursor[path[path.len() - 1]] = replacement;
        value
    }

    fn without(mut value: Value, path: &[&str]) -> Value {
        let mut cursor = &mut value;
        for key in &path[..path.len() - 1] {
            cursor = cursor.get_mut(*key).unwrap();
        }
        cursor.as_object_mut().unwrap().remove(path[path.len() - 1]);
        value
    }

    #[test]
    fn test_accepts_valid_event() {
        assert!(validate_event(&valid()));
    }

    #[test]
    fn test_rejects_non_objects() {
        assert_eq!(parse_event(&json!(null)), Err(ValidationError::NotAnObject));
        assert_eq!(parse_event(&json!("{}")), Err(ValidationError::NotAnObject));
        assert_eq!(parse_event(&json!([1, 2])), Err(ValidationError::NotAnObject));
    }

    #[test]
    fn test_rejects_wrong_version() {
        assert_eq!(
            parse_event(&with(valid(), &["v"], json!(2))),
            Err(ValidationError::UnsupportedVersion("2".to_string()))
        );
        assert_eq!(
            parse_event(&without(valid(), &["v"])),
            Err(ValidationError::MissingField("v"))
        );
    }

    #[test]
    fn test_rejects_missing_or_empty_required_fields() {
        for field in ["eid", "type", "subtype", "actor"] {
            assert_eq!(
                parse_event(&without(valid(), &[field])),
                Err(ValidationError::MissingField(field)),
                "missing {field}"
            );
            assert_eq!(
                parse_event(&with(valid(), &[field], json!(""))),
                Err(ValidationError::MissingField(field)),
                "empty {field}"
            );
        }

        assert_eq!(
            parse_event(&without(valid(), &["ctx"])),
            Err(ValidationError::MissingField("ctx"))
        );
    }

    #[test]
    fn test_rejects_unknown_type_and_subtype() {
        assert_eq!(
            parse_event(&with(valid(), &["type"], json!("badge"))),
            Err(ValidationError::UnknownType("badge".to_string()))
        );
        assert_eq!(
            parse_event(&with(valid(), &["subtype"], json!("delete"))),
            Err(ValidationError::UnknownSubtype("delete".to_string()))
        );
    }

    #[test]
    fn test_rejects_subtype_from_another_type() {
        assert_eq!(
            parse_event(&with(valid(), &["subtype"], json!("allocate"))),
            Err(ValidationError::SubtypeMismatch {
                event_type: "contact".to_string(),
                subtype: "allocate".to_string(),
            })
        );
    }

    #[test]
    fn test_rejects_incomplete_context() {
        assert_eq!(
            parse_event(&without(valid(), &["ctx", "domain"])),
            Err(ValidationError::IncompleteContext("domain"))
        );
        assert_eq!(
            parse_event(&with(valid(), &["ctx", "domain"], json!("gaming"))),
            Err(ValidationError::IncompleteContext("domain"))
        );
        assert_eq!(
            parse_event(&with(valid(), &["ctx", "timestamp"], json!(0))),
            Err(ValidationError::IncompleteContext("timestamp"))
        );
        assert_eq!(
            parse_event(&without(valid(), &["ctx", "network"])),
            Err(ValidationError::IncompleteContext("network"))
        );
    }

    #[test]
    fn test_wrong_json_types_are_malformed() {
        let result = parse_event(&with(valid(), &["actor"], json!(12)));
        assert!(matches!(result, Err(ValidationError::Malformed(_))));

        let result = parse_event(&with(valid(), &["payload"], json!("text")));
        assert!(matches!(result, Err(ValidationError::Malformed(_))));
    }

    #[test]
    fn test_subject_is_optional() {
        assert!(validate_event(&without(valid(), &["subject"])));
    }
}
