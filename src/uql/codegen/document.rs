//! Document-store code generation (MongoDB-style operation objects).

use serde_json::{Map, Value as JsonValue, json};

use super::required_filter;
use crate::error::QueryResult;
use crate::uql::ast::{Action, Clause, CompareOp, Condition, Intent};
use crate::validator::validate_identifier;

pub fn compile(intent: &Intent) -> QueryResult<JsonValue> {
    let collection = collection_name(&intent.entity)?;
    match intent.action {
        Action::Find => {
            let filter = match intent.filter() {
                Some(condition) => filter(condition)?,
                None => json!({}),
            };
            Ok(json!({ "find": collection, "where": filter }))
        }
        Action::Create => Ok(json!({
            "insert": collection,
            "document": payload(intent)?,
        })),
        Action::Delete => {
            let condition = required_filter(intent)?;
            Ok(json!({ "delete": collection, "where": filter(condition)? }))
        }
        Action::Update => {
            let condition = required_filter(intent)?;
            Ok(json!({
                "update": collection,
                "where": filter(condition)?,
                "values": payload(intent)?,
            }))
        }
    }
}

/// Collections are the entity name lowercased.
pub fn collection_name(entity: &str) -> QueryResult<String> {
    Ok(validate_identifier(entity.trim())?.to_lowercase())
}

/// Filter document for a condition: `$or` of `$and` groups, collapsed when trivial.
pub fn filter(condition: &Condition) -> QueryResult<JsonValue> {
    let mut groups = Vec::with_capacity(condition.groups.len());
    for group in &condition.groups {
        let mut clauses = Vec::with_capacity(group.len());
        for clause in group {
            clauses.push(clause_filter(clause)?);
        }
        groups.push(combine("$and", clauses));
    }
    Ok(combine("$or", groups))
}

fn combine(operator: &str, mut parts: Vec<JsonValue>) -> JsonValue {
    match parts.len() {
        0 => json!({}),
        1 => parts.remove(0),
        _ => json!({ operator: parts }),
    }
}

fn clause_filter(clause: &Clause) -> QueryResult<JsonValue> {
    let mut doc = Map::new();
    match clause {
        Clause::Has { field } => {
            doc.insert(
                validate_identifier(field)?.to_string(),
                json!({ "$exists": true }),
            );
        }
        Clause::Compare { field, op, value } => {
            let value = value.to_json();
            let predicate = match op {
                CompareOp::Gt => json!({ "$gt": value }),
                CompareOp::Lt => json!({ "$lt": value }),
                CompareOp::Eq => value,
            };
            doc.insert(validate_identifier(field)?.to_string(), predicate);
        }
    }
    Ok(JsonValue::Object(doc))
}

fn payload(intent: &Intent) -> QueryResult<JsonValue> {
    for (field, _) in &intent.payload {
        validate_identifier(field)?;
    }
    Ok(JsonValue::Object(intent.payload_record()))
}
