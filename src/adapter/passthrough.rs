//! Vector and AI adapters.
//!
//! Neither family is executed here. Requests are shaped into
//! `{"action", "entity", ...}` objects and returned in the pass-through
//! envelope.

use serde_json::{Value as JsonValue, json};

use super::{NativeRequest, envelope};
use crate::error::{QueryError, QueryResult};
use crate::models::{Record, Where};
use crate::router::Family;
use crate::uql::{self, Action, Intent, render};

#[derive(Debug, Clone)]
pub struct PassthroughAdapter {
    family: Family,
    instance: String,
    url: Option<String>,
}

impl PassthroughAdapter {
    pub fn new(family: Family, instance: impl Into<String>, url: Option<String>) -> Self {
        Self {
            family,
            instance: instance.into(),
            url,
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn run_native(&self, request: NativeRequest, params: &Record) -> QueryResult<JsonValue> {
        if !params.is_empty() {
            return Err(QueryError::validation(format!(
                "The {} adapter does not take a parameter map",
                self.family
            )));
        }
        let note = format!("{} adapter is a pass-through stub.", self.family);
        Ok(envelope(
            self.family.as_str(),
            &self.instance,
            self.url.as_deref(),
            request.into_json(),
            &note,
        ))
    }

    /// Wrap UQL text for the remote service. The statement must still parse,
    /// and a DELETE must carry a condition.
    pub fn convert_uql(&self, text: &str) -> QueryResult<JsonValue> {
        self.uql_request(&uql::parse(text)?, text.trim())
    }

    pub fn execute_uql(&self, text: &str) -> QueryResult<JsonValue> {
        let request = self.convert_uql(text)?;
        self.run_native(NativeRequest::Operation(request), &Record::new())
    }

    pub fn execute_intent(&self, intent: &Intent) -> QueryResult<JsonValue> {
        let request = self.uql_request(intent, &render::text(intent))?;
        self.run_native(NativeRequest::Operation(request), &Record::new())
    }

    fn uql_request(&self, intent: &Intent, text: &str) -> QueryResult<JsonValue> {
        if intent.action == Action::Delete && intent.filter().is_none() {
            return Err(QueryError::validation(format!(
                "DELETE {} requires a non-empty WHERE condition",
                intent.entity
            )));
        }
        Ok(json!({
            "action": format!("{}_uql_passthrough", self.family),
            "db_instance": self.instance,
            "uql": text,
        }))
    }

    pub fn create(&self, entity: &str, data: &Record) -> QueryResult<JsonValue> {
        self.shaped(json!({ "action": "create", "entity": entity, "data": data }))
    }

    pub fn create_many(&self, entity: &str, rows: &[Record]) -> QueryResult<JsonValue> {
        self.shaped(json!({ "action": "create_many", "entity": entity, "rows": rows }))
    }

    pub fn find(
        &self,
        entity: &str,
        filter: Option<&Where>,
        order_by: Option<&str>,
        limit: Option<i64>,
    ) -> QueryResult<JsonValue> {
        self.shaped(json!({
            "action": "find",
            "entity": entity,
            "where": filter.map(where_json),
            "order_by": order_by,
            "limit": limit,
        }))
    }

    pub fn delete(&self, entity: &str, filter: &Where) -> QueryResult<JsonValue> {
        if filter.is_empty() {
            return Err(QueryError::validation(
                "delete requires a non-empty where condition",
            ));
        }
        self.shaped(json!({ "action": "delete", "entity": entity, "where": where_json(filter) }))
    }

    fn shaped(&self, request: JsonValue) -> QueryResult<JsonValue> {
        self.run_native(NativeRequest::Operation(request), &Record::new())
    }
}

fn where_json(filter: &Where) -> JsonValue {
    match filter {
        Where::Fields(fields) => JsonValue::Object(fields.clone()),
        Where::Raw(text) => JsonValue::String(text.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_uql_tags_family() {
        let adapter = PassthroughAdapter::new(Family::Vector, "qdrant", None);
        assert_eq!(
            adapter.convert_uql("FIND Doc").unwrap(),
            json!({"action": "vector_uql_passthrough", "db_instance": "qdrant", "uql": "FIND Doc"})
        );
    }

    #[test]
    fn test_uql_delete_needs_condition() {
        for family in [Family::Vector, Family::Ai] {
            let adapter = PassthroughAdapter::new(family, family.default_instance(), None);
            for text in ["DELETE Orders", "  delete Orders  "] {
                let err = adapter.execute_uql(text).unwrap_err();
                assert!(matches!(err, QueryError::Validation { .. }), "{family} {text}");
            }
            assert!(adapter.convert_uql("DELETE Orders WHERE").is_err());
            let out = adapter.execute_uql("DELETE Orders WHERE id = 3").unwrap();
            assert_eq!(out["native_query"]["uql"], json!("DELETE Orders WHERE id = 3"));
        }
    }

    #[test]
    fn test_requests_are_shaped_and_enveloped() {
        let adapter = PassthroughAdapter::new(Family::Ai, "openai", Some("https://api.example".into()));
        let out = adapter
            .find("Prompt", Some(&Where::from("topic = 'rust'")), None, Some(5))
            .unwrap();
        assert_eq!(out["db_type"], json!("ai"));
        assert_eq!(out["url"], json!("https://api.example"));
        assert_eq!(
            out["native_query"],
            json!({"action": "find", "entity": "Prompt", "where": "topic = 'rust'", "order_by": null, "limit": 5})
        );
        assert!(out["note"].as_str().unwrap().contains("pass-through"));

        let rows = vec![json!({"v": [0.1, 0.2]}).as_object().cloned().unwrap()];
        let out = adapter.create_many("Embedding", &rows).unwrap();
        assert_eq!(out["native_query"]["rows"][0]["v"], json!([0.1, 0.2]));
    }

    #[test]
    fn test_params_rejected() {
        let adapter = PassthroughAdapter::new(Family::Vector, "pinecone", None);
        let params = json!({"k": 3}).as_object().cloned().unwrap();
        assert!(adapter.run_native("search".into(), &params).is_err());
        let out = adapter.run_native("search".into(), &Record::new()).unwrap();
        assert_eq!(out["native_query"], json!("search"));
        assert_eq!(out["url"], JsonValue::Null);
    }
}
