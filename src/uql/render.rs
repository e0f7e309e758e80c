//! Facade operations as UQL for non-relational backends.
//!
//! Arguments become an [`Intent`] directly, so JSON values keep their type
//! (`-5` stays an integer, `1e20` a float) instead of being re-coerced from
//! text. [`text`] renders an intent back to UQL for backends that forward the
//! statement unexecuted.

use serde_json::Value as JsonValue;

use super::ast::{Action, Clause, Condition, Intent, Literal};
use super::codegen::sql::parse_order_by;
use super::parse;
use crate::error::{QueryError, QueryResult};
use crate::models::{Record, Where};
use crate::validator::{validate_identifier, validate_payload};

/// `CREATE <entity> {k: v, ...}`
pub fn create(entity: &str, data: &Record) -> QueryResult<Intent> {
    let mut intent = Intent::new(Action::Create, validate_identifier(entity)?);
    for (field, value) in validate_payload(data)? {
        intent.payload.push((field.clone(), literal(value)?));
    }
    Ok(intent)
}

/// `FIND <entity> [WHERE ...] [ORDER BY ...] [LIMIT n]`
pub fn find(
    entity: &str,
    filter: Option<&Where>,
    order_by: Option<&str>,
    limit: Option<i64>,
) -> QueryResult<Intent> {
    let mut intent = Intent::new(Action::Find, validate_identifier(entity)?);
    if let Some(filter) = filter.filter(|w| !w.is_empty()) {
        intent.condition = Some(condition(entity, filter)?);
    }
    if let Some(order) = order_by.map(str::trim).filter(|s| !s.is_empty()) {
        intent.order_by = Some(parse_order_by(order)?);
    }
    if let Some(limit) = limit {
        if limit <= 0 {
            return Err(QueryError::validation("limit must be a positive integer"));
        }
        intent.limit = Some(limit as u64);
    }
    Ok(intent)
}

/// `DELETE <entity> WHERE ...`; an empty filter is refused.
pub fn delete(entity: &str, filter: &Where) -> QueryResult<Intent> {
    let mut intent = Intent::new(Action::Delete, validate_identifier(entity)?);
    if filter.is_empty() {
        return Err(QueryError::validation(
            "delete requires a non-empty where condition",
        ));
    }
    intent.condition = Some(condition(entity, filter)?);
    Ok(intent)
}

/// Equality mappings become an AND group; raw text is parsed as a UQL condition.
fn condition(entity: &str, filter: &Where) -> QueryResult<Condition> {
    match filter {
        Where::Fields(fields) => {
            let mut clauses = Vec::with_capacity(fields.len());
            for (field, value) in fields {
                clauses.push(Clause::Compare {
                    field: validate_identifier(field)?.to_string(),
                    op: super::CompareOp::Eq,
                    value: literal(value)?,
                });
            }
            Ok(Condition {
                groups: vec![clauses],
            })
        }
        Where::Raw(text) => parse(&format!("FIND {} WHERE {}", entity, text.trim()))?
            .condition
            .ok_or_else(|| QueryError::validation("Raw where clause is empty")),
    }
}

/// Typed literal for a JSON scalar. Integers outside `i64` become floats.
pub fn literal(value: &JsonValue) -> QueryResult<Literal> {
    match value {
        JsonValue::Bool(b) => Ok(Literal::Bool(*b)),
        JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Literal::Int(i)),
            (None, Some(f)) => Ok(Literal::Float(f)),
            (None, None) => Err(QueryError::validation(format!(
                "Number {} has no UQL literal form",
                n
            ))),
        },
        JsonValue::String(s) => Ok(Literal::String(s.clone())),
        other => Err(QueryError::validation(format!(
            "Value {} has no UQL literal form",
            other
        ))),
    }
}

/// UQL text of an intent. Strings are single-quoted with `'` doubled.
pub fn text(intent: &Intent) -> String {
    let mut out = format!("{} {}", intent.action.keyword(), intent.entity);
    match intent.action {
        Action::Create => {
            out.push_str(&format!(" {{{}}}", assignments(&intent.payload)));
        }
        Action::Update => {
            out.push_str(&format!(" SET {}", assignments(&intent.payload)));
        }
        Action::Find | Action::Delete => {}
    }
    if let Some(condition) = intent.filter() {
        out.push_str(&format!(" WHERE {}", condition_text(condition)));
    }
    if let Some(order) = &intent.order_by {
        out.push_str(&format!(" ORDER BY {} {}", order.field, order.direction.keyword()));
    }
    if let Some(limit) = intent.limit {
        out.push_str(&format!(" LIMIT {}", limit));
    }
    out
}

fn assignments(payload: &[(String, Literal)]) -> String {
    payload
        .iter()
        .map(|(field, value)| format!("{}: {}", field, literal_text(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn condition_text(condition: &Condition) -> String {
    condition
        .groups
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|clause| match clause {
                    Clause::Has { field } => format!("HAS {}", field),
                    Clause::Compare { field, op, value } => {
                        format!("{} {} {}", field, op.symbol(), literal_text(value))
                    }
                })
                .collect::<Vec<_>>()
                .join(" AND ")
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn literal_text(value: &Literal) -> String {
    match value {
        Literal::Bool(b) => b.to_string(),
        Literal::Int(i) => i.to_string(),
        Literal::Float(f) => format!("{:?}", f),
        Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
    }
}
