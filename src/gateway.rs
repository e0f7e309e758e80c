//! The single entry point.
//!
//! A [`Gateway`] resolves its configuration once, opens the selected adapter
//! and forwards typed operations to it. Relational backends receive
//! `create`/`find`/`delete` directly; every other family gets them as a UQL
//! [`Intent`](crate::uql::Intent) built from the typed arguments.

use futures_util::future::BoxFuture;
use serde_json::Value as JsonValue;
use tracing::{debug, error};

use crate::adapter::{Adapter, NativeRequest};
use crate::config::GatewayConfig;
use crate::db::{EngineRegistry, TransactionContext};
use crate::error::{QueryError, QueryResult};
use crate::models::{Record, Where};
use crate::router::{self, Family, Route};
use crate::uql::{NativeQuery, render};
use crate::validator::validate_uql;

#[derive(Debug)]
pub struct Gateway {
    adapter: Adapter,
}

impl Gateway {
    /// Resolve `config` and open the adapter, reusing pools from `registry`.
    pub async fn connect(config: &GatewayConfig, registry: &EngineRegistry) -> QueryResult<Self> {
        Self::open(router::resolve(config)?, registry).await
    }

    /// Open an already resolved route.
    pub async fn open(route: Route, registry: &EngineRegistry) -> QueryResult<Self> {
        let adapter = route.open(registry).await?;
        debug!(backend = %adapter.family(), instance = adapter.instance(), "Gateway ready");
        Ok(Self { adapter })
    }

    /// Wrap an adapter built by hand.
    pub fn from_adapter(adapter: Adapter) -> Self {
        Self { adapter }
    }

    pub fn family(&self) -> Family {
        self.adapter.family()
    }

    pub fn instance(&self) -> &str {
        self.adapter.instance()
    }

    /// Connection string in use; contains credentials.
    pub fn url(&self) -> Option<&str> {
        self.adapter.url()
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Run a native query without parameters.
    pub async fn query(
        &self,
        ctx: &mut TransactionContext,
        request: impl Into<NativeRequest>,
    ) -> QueryResult<JsonValue> {
        self.adapter.run_native(ctx, request.into(), &Record::new()).await
    }

    /// Run a native query with named parameters (relational backends only).
    pub async fn execute(
        &self,
        ctx: &mut TransactionContext,
        request: impl Into<NativeRequest>,
        params: &Record,
    ) -> QueryResult<JsonValue> {
        self.adapter.run_native(ctx, request.into(), params).await
    }

    /// Compile UQL for this backend without running it.
    pub fn uquery(&self, text: &str) -> QueryResult<NativeQuery> {
        self.adapter.convert_uql(text)
    }

    /// Screen, compile and run a UQL statement.
    pub async fn uexecute(&self, ctx: &mut TransactionContext, text: &str) -> QueryResult<JsonValue> {
        validate_uql(text).into_result()?;
        self.adapter.execute_uql(ctx, text).await
    }

    pub async fn create(
        &self,
        ctx: &mut TransactionContext,
        entity: &str,
        data: &Record,
    ) -> QueryResult<JsonValue> {
        let entity = normalize_entity(entity)?;
        match self.family() {
            Family::Sql => self.adapter.create(ctx, entity, data).await,
            _ => {
                let intent = render::create(entity, data)?;
                self.adapter.execute_intent(ctx, &intent).await
            }
        }
    }

    /// Relational backends insert all rows in one transaction; other families
    /// get one `create` per row and return the results in row order.
    pub async fn create_many(
        &self,
        ctx: &mut TransactionContext,
        entity: &str,
        rows: &[Record],
    ) -> QueryResult<JsonValue> {
        let entity = normalize_entity(entity)?;
        if self.family() == Family::Sql {
            return self.adapter.create_many(ctx, entity, rows).await;
        }
        if rows.is_empty() {
            return Err(QueryError::validation(
                "create_many requires a non-empty list of rows",
            ));
        }
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(self.create(ctx, entity, row).await?);
        }
        Ok(JsonValue::Array(results))
    }

    pub async fn find(
        &self,
        ctx: &mut TransactionContext,
        entity: &str,
        filter: Option<&Where>,
        order_by: Option<&str>,
        limit: Option<i64>,
    ) -> QueryResult<JsonValue> {
        let entity = normalize_entity(entity)?;
        match self.family() {
            Family::Sql => self.adapter.find(ctx, entity, filter, order_by, limit).await,
            _ => {
                let intent = render::find(entity, filter, order_by, limit)?;
                self.adapter.execute_intent(ctx, &intent).await
            }
        }
    }

    pub async fn delete(
        &self,
        ctx: &mut TransactionContext,
        entity: &str,
        filter: &Where,
    ) -> QueryResult<JsonValue> {
        let entity = normalize_entity(entity)?;
        match self.family() {
            Family::Sql => self.adapter.delete(ctx, entity, filter).await,
            _ => {
                let intent = render::delete(entity, filter)?;
                self.adapter.execute_intent(ctx, &intent).await
            }
        }
    }

    pub async fn begin(&self, ctx: &mut TransactionContext) -> QueryResult<()> {
        self.relational()?.begin(ctx).await
    }

    pub async fn commit(&self, ctx: &mut TransactionContext) -> QueryResult<()> {
        self.relational()?.commit(ctx).await
    }

    pub async fn rollback(&self, ctx: &mut TransactionContext) -> QueryResult<()> {
        self.relational()?.rollback(ctx).await
    }

    /// Run `body` inside a transaction.
    ///
    /// Commits when `body` succeeds. When it fails the transaction is rolled
    /// back and the caller gets the original error; a failing rollback is
    /// logged and does not replace it.
    pub async fn transaction<T, F>(&self, ctx: &mut TransactionContext, body: F) -> QueryResult<T>
    where
        F: for<'c> FnOnce(&'c Gateway, &'c mut TransactionContext) -> BoxFuture<'c, QueryResult<T>>,
    {
        self.begin(ctx).await?;
        match body(self, &mut *ctx).await {
            Ok(value) => {
                self.commit(ctx).await?;
                Ok(value)
            }
            Err(e) => {
                if ctx.in_transaction() {
                    if let Err(rollback_err) = self.rollback(ctx).await {
                        error!(
                            context_id = %ctx.id(),
                            error = %rollback_err,
                            original = %e,
                            "Rollback after failed transaction body failed"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn relational(&self) -> QueryResult<&crate::adapter::SqlAdapter> {
        match &self.adapter {
            Adapter::Sql(adapter) => Ok(adapter),
            other => Err(QueryError::transaction(format!(
                "Transactions are not supported for backend {}",
                other.family()
            ))),
        }
    }
}

/// Entity names are trimmed and must not be empty.
fn normalize_entity(entity: &str) -> QueryResult<&str> {
    let entity = entity.trim();
    if entity.is_empty() {
        return Err(QueryError::validation("Entity name must not be empty"));
    }
    Ok(entity)
}
