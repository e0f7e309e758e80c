//! Graph adapter (Cypher).
//!
//! Queries are compiled but not executed: `run_native` wraps them in the
//! pass-through envelope shared with the vector and AI adapters.

use serde_json::Value as JsonValue;

use super::{NativeRequest, envelope};
use crate::error::{QueryError, QueryResult};
use crate::models::{Record, Where};
use crate::uql::{self, Intent, NativeQuery, Target, render};

const NOTE: &str = "Graph adapter compiles Cypher without executing it.";

#[derive(Debug, Clone)]
pub struct GraphAdapter {
    instance: String,
    url: Option<String>,
}

impl GraphAdapter {
    pub fn new(instance: impl Into<String>, url: Option<String>) -> Self {
        Self {
            instance: instance.into(),
            url,
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn run_native(&self, request: NativeRequest, params: &Record) -> QueryResult<JsonValue> {
        if !params.is_empty() {
            return Err(QueryError::validation(
                "Graph backends do not take a parameter map",
            ));
        }
        Ok(envelope(
            "graph",
            &self.instance,
            self.url.as_deref(),
            request.into_json(),
            NOTE,
        ))
    }

    pub fn convert_uql(&self, text: &str) -> QueryResult<NativeQuery> {
        uql::translate(text, Target::Graph)
    }

    pub fn execute_uql(&self, text: &str) -> QueryResult<JsonValue> {
        self.execute_intent(&uql::parse(text)?)
    }

    pub fn execute_intent(&self, intent: &Intent) -> QueryResult<JsonValue> {
        match uql::compile(intent, Target::Graph)? {
            NativeQuery::Cypher(cypher) => self.run_native(cypher.into(), &Record::new()),
            other => Err(QueryError::translation(
                format!("Unexpected native query {:?}", other),
                "graph",
            )),
        }
    }

    pub fn create(&self, entity: &str, data: &Record) -> QueryResult<JsonValue> {
        self.execute_intent(&render::create(entity, data)?)
    }

    /// One CREATE per row; the results come back in row order.
    pub fn create_many(&self, entity: &str, rows: &[Record]) -> QueryResult<JsonValue> {
        if rows.is_empty() {
            return Err(QueryError::validation(
                "create_many requires a non-empty list of rows",
            ));
        }
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(self.create(entity, row)?);
        }
        Ok(JsonValue::Array(results))
    }

    pub fn find(
        &self,
        entity: &str,
        filter: Option<&Where>,
        order_by: Option<&str>,
        limit: Option<i64>,
    ) -> QueryResult<JsonValue> {
        self.execute_intent(&render::find(entity, filter, order_by, limit)?)
    }

    pub fn delete(&self, entity: &str, filter: &Where) -> QueryResult<JsonValue> {
        self.execute_intent(&render::delete(entity, filter)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> GraphAdapter {
        GraphAdapter::new("neo4j", Some("bolt://localhost:7687".into()))
    }

    #[test]
    fn test_uql_wrapped_in_envelope() {
        let out = adapter()
            .execute_uql("FIND User WHERE age > 25 AND active = true")
            .unwrap();
        assert_eq!(out["db_type"], json!("graph"));
        assert_eq!(out["db_instance"], json!("neo4j"));
        assert_eq!(out["url"], json!("bolt://localhost:7687"));
        assert_eq!(
            out["native_query"],
            json!("MATCH (n:User) WHERE n.age > 25 AND n.active = true RETURN n;")
        );
    }

    #[test]
    fn test_facade_operations_compile_through_uql() {
        let adapter = adapter();
        let data = json!({"name": "Veeresh", "age": 23}).as_object().cloned().unwrap();
        let out = adapter.create("User", &data).unwrap();
        assert_eq!(
            out["native_query"],
            json!("CREATE (n:User {name: \"Veeresh\", age: 23}) RETURN n;")
        );

        let filter = Where::from(json!({"name": "Bo"}).as_object().cloned().unwrap());
        let out = adapter.delete("User", &filter).unwrap();
        assert_eq!(
            out["native_query"],
            json!("MATCH (n:User) WHERE n.name = \"Bo\" DELETE n;")
        );

        let err = adapter.find("User", None, None, Some(3)).unwrap_err();
        assert!(matches!(err, QueryError::Translation { .. }));
        assert!(adapter.delete("User", &Where::Fields(Record::new())).is_err());
    }

    #[test]
    fn test_numbers_keep_their_type() {
        let data = json!({"balance": -5, "ratio": 0.5}).as_object().cloned().unwrap();
        let out = adapter().create("Account", &data).unwrap();
        assert_eq!(
            out["native_query"],
            json!("CREATE (n:Account {balance: -5, ratio: 0.5}) RETURN n;")
        );
    }

    #[test]
    fn test_params_rejected() {
        let params = json!({"id": 1}).as_object().cloned().unwrap();
        let err = adapter().run_native("MATCH (n) RETURN n".into(), &params).unwrap_err();
        assert!(matches!(err, QueryError::Validation { .. }));
    }
}
