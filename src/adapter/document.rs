//! Document-store adapter.
//!
//! Operation objects have the shape produced by the document code generator
//! (`find`, `insert`, `delete`, `update`). Only the `mongodb` instance is
//! executed against a [`DocumentStore`]; other instances hand the compiled
//! operation back untouched.

use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::NativeRequest;
use crate::db::{DocumentStore, EngineRegistry};
use crate::error::{QueryError, QueryResult};
use crate::models::{Record, Where, mask_credentials};
use crate::uql::codegen::document;
use crate::uql::{self, Intent, NativeQuery, Target};
use crate::validator::{validate_identifier, validate_payload};

const DEFAULT_DATABASE: &str = "udom";

#[derive(Debug)]
pub struct DocumentAdapter {
    instance: String,
    url: Option<String>,
    store: Option<Arc<dyn DocumentStore>>,
}

impl DocumentAdapter {
    /// Attach to the registry's store for the URL when the instance is executable.
    pub async fn open(instance: String, url: Option<String>, registry: &EngineRegistry) -> Self {
        let store = match (instance.as_str(), url.as_deref()) {
            ("mongodb", Some(url)) => Some(registry.document_store(url, &database_name(url)).await),
            _ => None,
        };
        Self {
            instance,
            url,
            store,
        }
    }

    /// Adapter over an explicit store, bypassing the registry.
    pub fn with_store(url: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            instance: "mongodb".to_string(),
            url: Some(url.into()),
            store: Some(store),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub async fn run_native(&self, request: NativeRequest, params: &Record) -> QueryResult<JsonValue> {
        if !params.is_empty() {
            return Err(QueryError::validation(
                "Document backends do not take a parameter map",
            ));
        }
        let Some(store) = &self.store else {
            return Ok(request.into_json());
        };

        match request {
            NativeRequest::Text(command) => match command.trim().to_ascii_lowercase().as_str() {
                "show dbs" | "show databases" => Ok(json!(store.list_databases().await?)),
                "ping" => store.ping().await,
                _ => Err(QueryError::validation(format!(
                    "Unsupported document command '{}'. Use an operation object, 'show dbs' or 'ping'",
                    command.trim()
                ))),
            },
            NativeRequest::Operation(op) => self.run_operation(store.as_ref(), &op).await,
        }
    }

    pub fn convert_uql(&self, text: &str) -> QueryResult<NativeQuery> {
        uql::translate(text, Target::Document)
    }

    pub async fn execute_uql(&self, text: &str) -> QueryResult<JsonValue> {
        self.execute_intent(&uql::parse(text)?).await
    }

    pub async fn execute_intent(&self, intent: &Intent) -> QueryResult<JsonValue> {
        let op = uql::compile(intent, Target::Document)?.to_json();
        self.run_native(NativeRequest::Operation(op), &Record::new()).await
    }

    pub async fn create(&self, entity: &str, data: &Record) -> QueryResult<JsonValue> {
        validate_payload(data)?;
        let op = json!({
            "insert": document::collection_name(entity)?,
            "document": data,
        });
        self.run_native(NativeRequest::Operation(op), &Record::new()).await
    }

    pub async fn create_many(&self, entity: &str, rows: &[Record]) -> QueryResult<JsonValue> {
        if rows.is_empty() {
            return Err(QueryError::validation(
                "create_many requires a non-empty list of rows",
            ));
        }
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(self.create(entity, row).await?);
        }
        Ok(json!({ "inserted_count": results.len(), "results": results }))
    }

    pub async fn find(
        &self,
        entity: &str,
        filter: Option<&Where>,
        order_by: Option<&str>,
        limit: Option<i64>,
    ) -> QueryResult<JsonValue> {
        if order_by.is_some() || limit.is_some() {
            return Err(QueryError::translation(
                "ORDER BY and LIMIT are only supported by relational backends",
                "nosql",
            ));
        }
        let filter = match filter {
            Some(filter) => native_filter(entity, filter)?,
            None => json!({}),
        };
        let op = json!({ "find": document::collection_name(entity)?, "where": filter });
        self.run_native(NativeRequest::Operation(op), &Record::new()).await
    }

    pub async fn delete(&self, entity: &str, filter: &Where) -> QueryResult<JsonValue> {
        let native = native_filter(entity, filter)?;
        if native.as_object().is_none_or(|f| f.is_empty()) {
            return Err(QueryError::validation(
                "delete requires a non-empty where condition",
            ));
        }
        let op = json!({ "delete": document::collection_name(entity)?, "where": native });
        self.run_native(NativeRequest::Operation(op), &Record::new()).await
    }

    async fn run_operation(&self, store: &dyn DocumentStore, op: &JsonValue) -> QueryResult<JsonValue> {
        let op = op.as_object().ok_or_else(|| {
            QueryError::validation("A document operation must be a JSON object")
        })?;
        let empty = json!({});
        let filter = op.get("where").unwrap_or(&empty);
        debug!(
            url = %self.url.as_deref().map(mask_credentials).unwrap_or_default(),
            operation = ?op.keys().next(),
            "Executing document operation"
        );

        if let Some(collection) = op.get("find") {
            let docs = store.find(collection_arg(collection)?, filter).await?;
            return Ok(JsonValue::Array(docs.into_iter().map(JsonValue::Object).collect()));
        }
        if let Some(collection) = op.get("insert") {
            let document = object_arg(op.get("document"), "document")?;
            let id = store.insert_one(collection_arg(collection)?, document).await?;
            return Ok(json!({ "inserted_id": id }));
        }
        if let Some(collection) = op.get("delete") {
            let deleted = store.delete_many(collection_arg(collection)?, filter).await?;
            return Ok(json!({ "deleted_count": deleted }));
        }
        if let Some(collection) = op.get("update") {
            let values = object_arg(op.get("values"), "values")?;
            let counts = store
                .update_many(collection_arg(collection)?, filter, &values)
                .await?;
            return Ok(json!({
                "matched_count": counts.matched,
                "modified_count": counts.modified,
            }));
        }
        Err(QueryError::validation(
            "Unsupported document operation; expected find, insert, delete or update",
        ))
    }
}

/// Database named by the URL path, `udom` when absent.
pub fn database_name(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path()
                .trim_matches('/')
                .split('/')
                .next()
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .unwrap_or_else(|| DEFAULT_DATABASE.to_string())
}

/// Equality mappings pass through; a raw condition is compiled as UQL.
fn native_filter(entity: &str, filter: &Where) -> QueryResult<JsonValue> {
    match filter {
        Where::Fields(fields) => {
            for key in fields.keys() {
                validate_identifier(key)?;
            }
            Ok(JsonValue::Object(fields.clone()))
        }
        Where::Raw(text) if text.trim().is_empty() => Ok(json!({})),
        Where::Raw(text) => {
            let intent = uql::parse(&format!("FIND {} WHERE {}", entity, text.trim()))?;
            match intent.filter() {
                Some(condition) => document::filter(condition),
                None => Ok(json!({})),
            }
        }
    }
}

fn collection_arg(value: &JsonValue) -> QueryResult<&str> {
    value
        .as_str()
        .ok_or_else(|| QueryError::validation("Collection name must be a string"))
}

fn object_arg(value: Option<&JsonValue>, name: &str) -> QueryResult<Record> {
    match value {
        None => Ok(Record::new()),
        Some(JsonValue::Object(map)) => Ok(map.clone()),
        Some(_) => Err(QueryError::validation(format!("'{}' must be a JSON object", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDocumentStore;

    fn adapter() -> DocumentAdapter {
        DocumentAdapter::with_store(
            "mongodb://localhost:27017/shop",
            Arc::new(MemoryDocumentStore::new("shop")),
        )
    }

    fn record(value: JsonValue) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_database_name_from_url() {
        assert_eq!(database_name("mongodb://localhost:27017/shop"), "shop");
        assert_eq!(database_name("mongodb://localhost:27017"), "udom");
        assert_eq!(database_name("mongodb+srv://u:p@cluster.example/app?retryWrites=true"), "app");
    }

    #[tokio::test]
    async fn test_uql_round_trip_through_store() {
        let adapter = adapter();
        let inserted = adapter
            .execute_uql(r#"CREATE User {name: "Veeresh", age: 23}"#)
            .await
            .unwrap();
        assert!(inserted["inserted_id"].is_string());
        adapter.execute_uql("CREATE User {name: 'Mia', age: 31}").await.unwrap();

        let found = adapter.execute_uql("FIND User WHERE age > 25").await.unwrap();
        let found = found.as_array().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], json!("Mia"));

        let updated = adapter
            .execute_uql("UPDATE User SET tier: gold WHERE age < 30")
            .await
            .unwrap();
        assert_eq!(updated, json!({"matched_count": 1, "modified_count": 1}));

        let deleted = adapter.execute_uql("DELETE User WHERE HAS tier").await.unwrap();
        assert_eq!(deleted, json!({"deleted_count": 1}));
    }

    #[tokio::test]
    async fn test_facade_style_operations() {
        let adapter = adapter();
        let rows = vec![record(json!({"sku": "a", "qty": 1})), record(json!({"sku": "b", "qty": 5}))];
        let result = adapter.create_many("Stock", &rows).await.unwrap();
        assert_eq!(result["inserted_count"], json!(2));

        let filter = Where::from(record(json!({"sku": "b"})));
        let found = adapter.find("Stock", Some(&filter), None, None).await.unwrap();
        assert_eq!(found[0]["qty"], json!(5));

        let found = adapter.find("Stock", Some(&Where::from("qty > 2")), None, None).await.unwrap();
        assert_eq!(found.as_array().unwrap().len(), 1);

        let err = adapter.find("Stock", None, Some("qty"), None).await.unwrap_err();
        assert!(matches!(err, QueryError::Translation { .. }));

        assert!(adapter.delete("Stock", &Where::Fields(Record::new())).await.is_err());
        let deleted = adapter.delete("Stock", &filter).await.unwrap();
        assert_eq!(deleted, json!({"deleted_count": 1}));
    }

    #[tokio::test]
    async fn test_string_commands_and_params() {
        let adapter = adapter();
        assert_eq!(adapter.run_native("ping".into(), &Record::new()).await.unwrap(), json!({"ok": 1.0}));
        let dbs = adapter.run_native("SHOW DBS".into(), &Record::new()).await.unwrap();
        assert_eq!(dbs, json!(["shop"]));
        assert!(adapter.run_native("drop everything".into(), &Record::new()).await.is_err());

        let params = record(json!({"x": 1}));
        let err = adapter.run_native("ping".into(), &params).await.unwrap_err();
        assert!(matches!(err, QueryError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_other_instances_return_operation_unexecuted() {
        let registry = EngineRegistry::new();
        let adapter = DocumentAdapter::open("redis".into(), None, &registry).await;
        let out = adapter.execute_uql("FIND Session WHERE active = true").await.unwrap();
        assert_eq!(out, json!({"find": "session", "where": {"active": true}}));
    }
}
