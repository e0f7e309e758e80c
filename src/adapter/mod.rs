//! Backend adapters.
//!
//! [`Adapter`] has one variant per backend family and every variant offers
//! the same capability set: `run_native`, `convert_uql`, `execute_uql`,
//! `execute_intent`,
//! `create`, `create_many`, `find` and `delete`. Relational operations take
//! part in the caller's [`TransactionContext`]; the other families ignore it.

pub mod document;
pub mod graph;
pub mod passthrough;
pub mod sql;

pub use document::DocumentAdapter;
pub use graph::GraphAdapter;
pub use passthrough::PassthroughAdapter;
pub use sql::SqlAdapter;

use serde_json::{Value as JsonValue, json};

use crate::db::TransactionContext;
use crate::error::QueryResult;
use crate::models::{Record, Where};
use crate::router::Family;
use crate::uql::{Intent, NativeQuery};

/// A native query: statement or command text, or a structured operation.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeRequest {
    Text(String),
    Operation(JsonValue),
}

impl NativeRequest {
    pub fn into_json(self) -> JsonValue {
        match self {
            NativeRequest::Text(text) => JsonValue::String(text),
            NativeRequest::Operation(op) => op,
        }
    }
}

impl From<&str> for NativeRequest {
    fn from(text: &str) -> Self {
        NativeRequest::Text(text.to_string())
    }
}

impl From<String> for NativeRequest {
    fn from(text: String) -> Self {
        NativeRequest::Text(text)
    }
}

impl From<JsonValue> for NativeRequest {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::String(text) => NativeRequest::Text(text),
            other => NativeRequest::Operation(other),
        }
    }
}

/// Response of adapters that shape requests without executing them.
pub(crate) fn envelope(
    db_type: &str,
    instance: &str,
    url: Option<&str>,
    native_query: JsonValue,
    note: &str,
) -> JsonValue {
    json!({
        "db_type": db_type,
        "db_instance": instance,
        "url": url,
        "native_query": native_query,
        "note": note,
    })
}

#[derive(Debug)]
pub enum Adapter {
    Sql(SqlAdapter),
    Document(DocumentAdapter),
    Graph(GraphAdapter),
    Passthrough(PassthroughAdapter),
}

impl Adapter {
    pub fn family(&self) -> Family {
        match self {
            Adapter::Sql(_) => Family::Sql,
            Adapter::Document(_) => Family::NoSql,
            Adapter::Graph(_) => Family::Graph,
            Adapter::Passthrough(a) => a.family(),
        }
    }

    pub fn instance(&self) -> &str {
        match self {
            Adapter::Sql(a) => a.instance(),
            Adapter::Document(a) => a.instance(),
            Adapter::Graph(a) => a.instance(),
            Adapter::Passthrough(a) => a.instance(),
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Adapter::Sql(a) => Some(a.url()),
            Adapter::Document(a) => a.url(),
            Adapter::Graph(a) => a.url(),
            Adapter::Passthrough(a) => a.url(),
        }
    }

    pub async fn run_native(
        &self,
        ctx: &mut TransactionContext,
        request: NativeRequest,
        params: &Record,
    ) -> QueryResult<JsonValue> {
        match self {
            Adapter::Sql(a) => a.run_native(ctx, request, params).await,
            Adapter::Document(a) => a.run_native(request, params).await,
            Adapter::Graph(a) => a.run_native(request, params),
            Adapter::Passthrough(a) => a.run_native(request, params),
        }
    }

    /// Compile UQL without executing it.
    pub fn convert_uql(&self, text: &str) -> QueryResult<NativeQuery> {
        match self {
            Adapter::Sql(a) => a.convert_uql(text),
            Adapter::Document(a) => a.convert_uql(text),
            Adapter::Graph(a) => a.convert_uql(text),
            Adapter::Passthrough(a) => a.convert_uql(text).map(NativeQuery::Passthrough),
        }
    }

    /// Compile UQL and run the result.
    pub async fn execute_uql(&self, ctx: &mut TransactionContext, text: &str) -> QueryResult<JsonValue> {
        match self {
            Adapter::Sql(a) => a.execute_uql(ctx, text).await,
            Adapter::Document(a) => a.execute_uql(text).await,
            Adapter::Graph(a) => a.execute_uql(text),
            Adapter::Passthrough(a) => a.execute_uql(text),
        }
    }

    /// Compile and run an already parsed statement.
    pub async fn execute_intent(
        &self,
        ctx: &mut TransactionContext,
        intent: &Intent,
    ) -> QueryResult<JsonValue> {
        match self {
            Adapter::Sql(a) => a.execute_intent(ctx, intent).await,
            Adapter::Document(a) => a.execute_intent(intent).await,
            Adapter::Graph(a) => a.execute_intent(intent),
            Adapter::Passthrough(a) => a.execute_intent(intent),
        }
    }

    pub async fn create(
        &self,
        ctx: &mut TransactionContext,
        entity: &str,
        data: &Record,
    ) -> QueryResult<JsonValue> {
        match self {
            Adapter::Sql(a) => a.create(ctx, entity, data).await,
            Adapter::Document(a) => a.create(entity, data).await,
            Adapter::Graph(a) => a.create(entity, data),
            Adapter::Passthrough(a) => a.create(entity, data),
        }
    }

    pub async fn create_many(
        &self,
        ctx: &mut TransactionContext,
        entity: &str,
        rows: &[Record],
    ) -> QueryResult<JsonValue> {
        match self {
            Adapter::Sql(a) => a.create_many(ctx, entity, rows).await,
            Adapter::Document(a) => a.create_many(entity, rows).await,
            Adapter::Graph(a) => a.create_many(entity, rows),
            Adapter::Passthrough(a) => a.create_many(entity, rows),
        }
    }

    pub async fn find(
        &self,
        ctx: &mut TransactionContext,
        entity: &str,
        filter: Option<&Where>,
        order_by: Option<&str>,
        limit: Option<i64>,
    ) -> QueryResult<JsonValue> {
        match self {
            Adapter::Sql(a) => a.find(ctx, entity, filter, order_by, limit).await,
            Adapter::Document(a) => a.find(entity, filter, order_by, limit).await,
            Adapter::Graph(a) => a.find(entity, filter, order_by, limit),
            Adapter::Passthrough(a) => a.find(entity, filter, order_by, limit),
        }
    }

    pub async fn delete(
        &self,
        ctx: &mut TransactionContext,
        entity: &str,
        filter: &Where,
    ) -> QueryResult<JsonValue> {
        match self {
            Adapter::Sql(a) => a.delete(ctx, entity, filter).await,
            Adapter::Document(a) => a.delete(entity, filter).await,
            Adapter::Graph(a) => a.delete(entity, filter),
            Adapter::Passthrough(a) => a.delete(entity, filter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_request_from_json() {
        assert_eq!(
            NativeRequest::from(json!("ping")),
            NativeRequest::Text("ping".into())
        );
        assert_eq!(
            NativeRequest::from(json!({"find": "x"})),
            NativeRequest::Operation(json!({"find": "x"}))
        );
        assert_eq!(NativeRequest::from("x").into_json(), json!("x"));
    }

    #[tokio::test]
    async fn test_every_family_refuses_unconditional_delete() {
        let registry = crate::db::EngineRegistry::new();
        let mut ctx = TransactionContext::new();
        let adapters = vec![
            Adapter::Sql(
                SqlAdapter::connect(
                    crate::models::ConnectionDescriptor::new("sqlite://", Default::default()),
                    &registry,
                )
                .await
                .unwrap(),
            ),
            Adapter::Document(
                DocumentAdapter::open("mongodb".into(), Some("mongodb://h/db".into()), &registry)
                    .await,
            ),
            Adapter::Graph(GraphAdapter::new("neo4j", None)),
            Adapter::Passthrough(PassthroughAdapter::new(Family::Vector, "qdrant", None)),
            Adapter::Passthrough(PassthroughAdapter::new(Family::Ai, "openai", None)),
        ];
        let empty = Where::Fields(Record::new());
        for adapter in &adapters {
            let family = adapter.family();
            assert!(adapter.delete(&mut ctx, "Orders", &empty).await.is_err(), "{family}");
            assert!(adapter.execute_uql(&mut ctx, "DELETE Orders").await.is_err(), "{family}");
            assert!(adapter.convert_uql("DELETE Orders").is_err(), "{family}");
        }
    }
}
