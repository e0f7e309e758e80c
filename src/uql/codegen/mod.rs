//! Compilation of a parsed [`Intent`] into a backend-native query.
//!
//! One generator per backend family. Literal coercion already happened in the
//! parser, so every generator sees the same typed values.

pub mod cypher;
pub mod document;
pub mod sql;

use serde_json::{Value as JsonValue, json};

use super::ast::{Condition, Intent};
use crate::db::dialect::SqlDialect;
use crate::error::{QueryError, QueryResult};
use crate::models::Record;

/// Which code generator to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Relational(SqlDialect),
    Graph,
    Document,
}

impl Target {
    pub fn name(&self) -> &'static str {
        match self {
            Target::Relational(_) => "sql",
            Target::Graph => "graph",
            Target::Document => "nosql",
        }
    }
}

/// `CREATE TABLE IF NOT EXISTS` statement that must precede an insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSetup {
    pub table: String,
    pub ddl: String,
}

/// SQL text with `:name` placeholders and the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub text: String,
    pub params: Record,
    pub setup: Option<TableSetup>,
}

impl SqlStatement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Record::new(),
            setup: None,
        }
    }
}

/// Backend-native output of translation.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeQuery {
    Sql(SqlStatement),
    Cypher(String),
    Document(JsonValue),
    Passthrough(JsonValue),
}

impl NativeQuery {
    /// JSON rendering used by the CLI and pass-through envelopes.
    pub fn to_json(&self) -> JsonValue {
        match self {
            NativeQuery::Sql(stmt) => {
                let mut out = json!({ "sql": stmt.text, "params": stmt.params });
                if let Some(setup) = &stmt.setup {
                    out["setup"] = JsonValue::String(setup.ddl.clone());
                }
                out
            }
            NativeQuery::Cypher(text) => JsonValue::String(text.clone()),
            NativeQuery::Document(op) | NativeQuery::Passthrough(op) => op.clone(),
        }
    }
}

/// Compile an intent for the given backend family.
pub fn compile(intent: &Intent, target: Target) -> QueryResult<NativeQuery> {
    match target {
        Target::Relational(dialect) => sql::compile(intent, dialect).map(NativeQuery::Sql),
        Target::Graph => {
            reject_ordering(intent, target)?;
            cypher::compile(intent).map(NativeQuery::Cypher)
        }
        Target::Document => {
            reject_ordering(intent, target)?;
            document::compile(intent).map(NativeQuery::Document)
        }
    }
}

/// Ordering and limits have no defined meaning outside relational stores.
fn reject_ordering(intent: &Intent, target: Target) -> QueryResult<()> {
    if intent.order_by.is_some() {
        return Err(QueryError::translation(
            "ORDER BY is only supported by relational backends",
            target.name(),
        ));
    }
    if intent.limit.is_some() {
        return Err(QueryError::translation(
            "LIMIT is only supported by relational backends",
            target.name(),
        ));
    }
    Ok(())
}

/// DELETE never runs unconditionally.
pub(crate) fn required_filter(intent: &Intent) -> QueryResult<&Condition> {
    intent.filter().ok_or_else(|| {
        QueryError::validation(format!(
            "{} {} requires a non-empty WHERE condition",
            intent.action.keyword(),
            intent.entity
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uql::parse;

    #[test]
    fn test_ordering_rejected_outside_relational() {
        let intent = parse("FIND User ORDER BY age").unwrap();
        for target in [Target::Graph, Target::Document] {
            let err = compile(&intent, target).unwrap_err();
            assert!(matches!(err, QueryError::Translation { .. }));
        }
        let intent = parse("FIND User LIMIT 3").unwrap();
        assert!(compile(&intent, Target::Graph).is_err());
        assert!(compile(&intent, Target::Relational(SqlDialect::Sqlite)).is_ok());
    }

    #[test]
    fn test_delete_without_filter_rejected_everywhere() {
        let intent = parse("DELETE User").unwrap();
        for target in [
            Target::Relational(SqlDialect::Sqlite),
            Target::Relational(SqlDialect::Mysql),
            Target::Relational(SqlDialect::Postgres),
            Target::Graph,
            Target::Document,
        ] {
            let err = compile(&intent, target).unwrap_err();
            assert!(matches!(err, QueryError::Validation { .. }), "{target:?}");
        }
    }

    #[test]
    fn test_native_query_json() {
        let intent = parse("FIND Orders WHERE paid = true").unwrap();
        let native = compile(&intent, Target::Relational(SqlDialect::Sqlite)).unwrap();
        let rendered = native.to_json();
        assert_eq!(rendered["sql"], "SELECT * FROM \"Orders\" WHERE \"paid\" = :p0");
        assert_eq!(rendered["params"]["p0"], true);
    }
}
