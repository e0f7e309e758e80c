//! Value types shared by the translator, the adapters and the facade.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Field name to value mapping, kept in insertion order.
pub type Record = serde_json::Map<String, JsonValue>;

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    String(String),
    /// Arrays and objects, bound as JSON text or a native JSON column
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }
}

impl From<&JsonValue> for QueryParam {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => Self::String(s.clone()),
            other => Self::Json(other.clone()),
        }
    }
}

/// The `where` argument of `find` and `delete`.
///
/// `Fields` is a conjunction of equality constraints whose values are always
/// bound as parameters. `Raw` is a trusted free-form predicate inserted
/// verbatim into the generated statement; only callers that control the text
/// may use it.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    Fields(Record),
    Raw(String),
}

impl Where {
    /// True when the filter constrains nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Fields(fields) => fields.is_empty(),
            Self::Raw(text) => text.trim().is_empty(),
        }
    }
}

impl From<Record> for Where {
    fn from(fields: Record) -> Self {
        Self::Fields(fields)
    }
}

impl From<&str> for Where {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_string())
    }
}

impl From<String> for Where {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_from_json() {
        assert_eq!(QueryParam::from(&json!(null)), QueryParam::Null);
        assert_eq!(QueryParam::from(&json!(true)), QueryParam::Bool(true));
        assert_eq!(QueryParam::from(&json!(101)), QueryParam::Int(101));
        assert_eq!(QueryParam::from(&json!(2.5)), QueryParam::Float(2.5));
        assert_eq!(
            QueryParam::from(&json!("A")),
            QueryParam::String("A".into())
        );
        assert_eq!(QueryParam::from(&json!([1, 2])).type_name(), "json");
    }

    #[test]
    fn test_where_emptiness() {
        assert!(Where::Fields(Record::new()).is_empty());
        assert!(Where::from("   ").is_empty());
        assert!(!Where::from("order_id = 1").is_empty());
        let fields = json!({"paid": true}).as_object().cloned().unwrap();
        assert!(!Where::from(fields).is_empty());
    }
}
