//! Parsed, backend-agnostic form of a UQL statement.

use serde_json::Value as JsonValue;

use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Find,
    Create,
    Delete,
    Update,
}

impl Action {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Find => "FIND",
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::Update => "UPDATE",
        }
    }
}

/// A literal value after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Literal {
    /// Coerce raw literal text.
    ///
    /// `true`/`false` (any case) become booleans, all-digit text an integer,
    /// `digits.digits` a float. Anything else is a string with one layer of
    /// surrounding quotes removed.
    pub fn coerce(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if is_digits(raw) {
            if let Ok(value) = raw.parse() {
                return Self::Int(value);
            }
        }
        if let Some((whole, frac)) = raw.split_once('.') {
            if is_digits(whole) && is_digits(frac) {
                if let Ok(value) = raw.parse() {
                    return Self::Float(value);
                }
            }
        }
        Self::String(unquote(raw))
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => JsonValue::from(*f),
            Self::String(s) => JsonValue::String(s.clone()),
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Strip one layer of surrounding quotes; doubled quotes inside collapse to one.
fn unquote(raw: &str) -> String {
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            let doubled = format!("{quote}{quote}");
            return raw[1..raw.len() - 1].replace(&doubled, &quote.to_string());
        }
    }
    raw.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Eq,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Compare {
        field: String,
        op: CompareOp,
        value: Literal,
    },
    /// `HAS field`: the field (or relationship) exists.
    Has { field: String },
}

/// Disjunction of conjunctions. `AND` binds tighter than `OR`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub groups: Vec<Vec<Clause>>,
}

impl Condition {
    pub fn single(clause: Clause) -> Self {
        Self {
            groups: vec![vec![clause]],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty)
    }

    /// Iterate every clause in source order.
    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.groups.iter().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// One parsed UQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: Action,
    pub entity: String,
    pub condition: Option<Condition>,
    /// Field/value pairs of CREATE and UPDATE, in source order.
    pub payload: Vec<(String, Literal)>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u64>,
}

impl Intent {
    pub fn new(action: Action, entity: impl Into<String>) -> Self {
        Self {
            action,
            entity: entity.into(),
            condition: None,
            payload: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Condition that constrains at least one field, if any.
    pub fn filter(&self) -> Option<&Condition> {
        self.condition.as_ref().filter(|c| !c.is_empty())
    }

    /// Payload as an ordered JSON record.
    pub fn payload_record(&self) -> Record {
        self.payload
            .iter()
            .map(|(field, value)| (field.clone(), value.to_json()))
            .collect()
    }
}
