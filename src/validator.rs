//! Syntactic and safety gate for identifiers, payloads and UQL text.
//!
//! Identifiers are checked before they are interpolated into any generated
//! query text. The UQL check is a denylist filter layered in front of the
//! parser; it rejects some harmless strings that merely look dangerous.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{QueryError, QueryResult};
use crate::models::Record;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Leading action keyword. The word boundary refuses `FINDER x`, which the
/// parser would reject anyway, so the screen and the parser agree.
static UQL_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(FIND|CREATE|UPDATE|DELETE)\b").expect("action pattern is valid")
});

static INJECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:--|/\*|\*/|;\s*(?:DROP|TRUNCATE|ALTER|CREATE)\b)")
        .expect("denylist pattern is valid")
});

/// Outcome of [`validate_uql`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UqlCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UqlCheck {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn rejected(error: &str) -> Self {
        Self {
            valid: false,
            error: Some(error.to_string()),
        }
    }

    /// Turn a rejected check into a `ValidationError`.
    pub fn into_result(self) -> QueryResult<()> {
        match self.error {
            Some(error) if !self.valid => Err(QueryError::validation(error)),
            _ => Ok(()),
        }
    }
}

/// Check that `name` is a plain identifier and hand it back.
pub fn validate_identifier(name: &str) -> QueryResult<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(QueryError::validation(format!(
            "Invalid identifier '{}'. Identifiers must start with a letter or underscore and contain only letters, digits and underscores.",
            name
        )))
    }
}

/// Check that a payload is non-empty and that every key is an identifier.
pub fn validate_payload(payload: &Record) -> QueryResult<&Record> {
    if payload.is_empty() {
        return Err(QueryError::validation("Payload must not be empty"));
    }
    for key in payload.keys() {
        validate_identifier(key)?;
    }
    Ok(payload)
}

/// Screen a UQL statement before it reaches the parser.
pub fn validate_uql(text: &str) -> UqlCheck {
    if !UQL_ACTION.is_match(text) {
        return UqlCheck::rejected("Invalid UQL syntax");
    }
    if INJECTION.is_match(text) {
        return UqlCheck::rejected("Potential injection risk");
    }
    UqlCheck::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_identifiers_pass_through() {
        for name in ["Orders", "_tmp", "order_id", "a1", "A_B_9"] {
            assert_eq!(validate_identifier(name).unwrap(), name);
        }
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        for name in ["", "1abc", "has space", "semi;colon", "dash-ed", "quote\"", "ünï"] {
            let err = validate_identifier(name).unwrap_err();
            assert!(matches!(err, QueryError::Validation { .. }), "{name}");
        }
    }

    #[test]
    fn test_payload_rules() {
        let empty = Record::new();
        assert!(validate_payload(&empty).is_err());

        let bad = json!({"ok": 1, "not ok": 2});
        assert!(validate_payload(bad.as_object().unwrap()).is_err());

        let good = json!({"order_id": 101, "customer": "A"});
        let map = good.as_object().unwrap();
        assert_eq!(validate_payload(map).unwrap().len(), 2);
    }

    #[test]
    fn test_uql_actions() {
        assert!(validate_uql("FIND Orders").valid);
        assert!(validate_uql("  create User {name: 'x'}").valid);
        assert!(validate_uql("Update User SET a: 1 WHERE b = 2").valid);
        assert!(validate_uql("delete User WHERE id = 1").valid);

        let check = validate_uql("SELECT * FROM users");
        assert!(!check.valid);
        assert_eq!(check.error.as_deref(), Some("Invalid UQL syntax"));
        assert!(!validate_uql("FINDER Orders").valid);
        assert!(!validate_uql("DELETEUser WHERE id = 1").valid);
        assert!(validate_uql("FIND\tOrders").valid);
    }

    #[test]
    fn test_screen_and_parser_agree_on_keyword() {
        for text in ["FINDER Orders", "CREATEx {a: 1}", "find Orders", "DELETE Orders WHERE a = 1"] {
            assert_eq!(
                validate_uql(text).valid,
                crate::uql::parse(text).is_ok(),
                "{text}"
            );
        }
    }

    #[test]
    fn test_uql_injection_patterns() {
        for text in [
            "FIND User WHERE a = 1 -- comment",
            "FIND User /* hidden */",
            "FIND User WHERE a = 1; DROP TABLE users",
            "FIND User WHERE a = 1;   truncate users",
            "DELETE User WHERE a = 1;alter table x",
            "FIND User WHERE a = 1; create table y",
        ] {
            let check = validate_uql(text);
            assert_eq!(check.error.as_deref(), Some("Potential injection risk"), "{text}");
        }
        // semicolon alone is not on the list
        assert!(validate_uql("FIND User WHERE note = 'a;b'").valid);
    }

    #[test]
    fn test_uql_check_into_result() {
        assert!(validate_uql("FIND x").into_result().is_ok());
        let err = validate_uql("nope").into_result().unwrap_err();
        assert!(err.to_string().contains("Invalid UQL syntax"));
    }
}
