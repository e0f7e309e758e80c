//! Relational adapter.
//!
//! Facade operations build parameterized statements directly; UQL goes
//! through the relational code generator. Generated INSERT text is cached per
//! `(operation, entity, columns)` and tables are set up at most once per
//! adapter unless a transaction that created them rolls back.

use parking_lot::Mutex;
use serde_json::{Value as JsonValue, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info};

use super::NativeRequest;
use crate::db::executor::{self, Outcome};
use crate::db::params::bind_named;
use crate::db::{DbPool, EngineRegistry, SqlDialect, TransactionContext, TransactionManager};
use crate::error::{QueryError, QueryResult};
use crate::models::{ConnectionDescriptor, Record, Where};
use crate::uql::codegen::sql;
use crate::uql::{self, Intent, NativeQuery, SqlStatement, TableSetup, Target};
use crate::validator::{validate_identifier, validate_payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum StatementKind {
    Insert,
    InsertMany,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StatementKey {
    kind: StatementKind,
    entity: String,
    columns: Vec<String>,
}

#[derive(Debug, Default)]
struct StatementCache {
    statements: HashMap<StatementKey, String>,
    known_tables: HashSet<String>,
}

#[derive(Debug)]
pub struct SqlAdapter {
    descriptor: ConnectionDescriptor,
    dialect: SqlDialect,
    pool: DbPool,
    transactions: TransactionManager,
    cache: Mutex<StatementCache>,
    schema_setups: AtomicU64,
    echo: bool,
}

impl SqlAdapter {
    /// Obtain (or reuse) the pool for `descriptor` from the registry.
    pub async fn connect(
        descriptor: ConnectionDescriptor,
        registry: &EngineRegistry,
    ) -> QueryResult<Self> {
        let dialect = SqlDialect::from(descriptor.db_type()?);
        let pool = registry.acquire(&descriptor).await?;
        let transactions =
            TransactionManager::new(pool.clone(), descriptor.connection_string().to_string());
        let echo = descriptor.pool_options().echo_or_default();
        Ok(Self {
            descriptor,
            dialect,
            pool,
            transactions,
            cache: Mutex::new(StatementCache::default()),
            schema_setups: AtomicU64::new(0),
            echo,
        })
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn instance(&self) -> &'static str {
        match self.dialect {
            SqlDialect::Sqlite => "sqlite",
            SqlDialect::Postgres => "postgres",
            SqlDialect::Mysql => "mysql",
        }
    }

    pub fn url(&self) -> &str {
        self.descriptor.connection_string()
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Number of `CREATE TABLE IF NOT EXISTS` statements actually issued.
    pub fn schema_setups(&self) -> u64 {
        self.schema_setups.load(Ordering::Relaxed)
    }

    /// Number of cached INSERT statements.
    pub fn cached_statements(&self) -> usize {
        self.cache.lock().statements.len()
    }

    pub async fn run_native(
        &self,
        ctx: &mut TransactionContext,
        request: NativeRequest,
        params: &Record,
    ) -> QueryResult<JsonValue> {
        let sql = match request {
            NativeRequest::Text(sql) => sql,
            NativeRequest::Operation(_) => {
                return Err(QueryError::validation(
                    "Relational backends take SQL text, not an operation object",
                ));
            }
        };
        if sql.trim().is_empty() {
            return Err(QueryError::validation("Query must be a non-empty string"));
        }
        Ok(self.run(ctx, &sql, params).await?.into_json())
    }

    pub fn convert_uql(&self, text: &str) -> QueryResult<NativeQuery> {
        uql::translate(text, Target::Relational(self.dialect))
    }

    pub async fn execute_uql(
        &self,
        ctx: &mut TransactionContext,
        text: &str,
    ) -> QueryResult<JsonValue> {
        self.execute_intent(ctx, &uql::parse(text)?).await
    }

    pub async fn execute_intent(
        &self,
        ctx: &mut TransactionContext,
        intent: &Intent,
    ) -> QueryResult<JsonValue> {
        let stmt = sql::compile(intent, self.dialect)?;
        Ok(self.execute_statement(ctx, &stmt).await?.into_json())
    }

    pub async fn create(
        &self,
        ctx: &mut TransactionContext,
        entity: &str,
        data: &Record,
    ) -> QueryResult<JsonValue> {
        validate_identifier(entity)?;
        validate_payload(data)?;
        let setup = sql::create_table(self.dialect, entity, data)?;
        self.ensure_table(ctx, &setup).await?;

        let columns: Vec<String> = data.keys().cloned().collect();
        let insert = self.statement(StatementKind::Insert, entity, columns)?;
        let outcome = self.run(ctx, &insert, data).await?;
        debug!(entity, rows_affected = outcome.rows_affected(), "Created record");
        Ok(outcome.into_json())
    }

    /// Insert every row inside one transaction: the caller's when the context
    /// has one open on this database, otherwise a private one.
    pub async fn create_many(
        &self,
        ctx: &mut TransactionContext,
        entity: &str,
        rows: &[Record],
    ) -> QueryResult<JsonValue> {
        validate_identifier(entity)?;
        let first = rows.first().ok_or_else(|| {
            QueryError::validation("create_many requires a non-empty list of rows")
        })?;
        let columns: Vec<String> = first.keys().cloned().collect();
        for row in rows {
            validate_payload(row)?;
            if !row.keys().eq(columns.iter()) {
                return Err(QueryError::validation(
                    "All rows in create_many must have the same field order",
                ));
            }
        }
        let setup = sql::create_table(self.dialect, entity, first)?;
        let insert = self.statement(StatementKind::InsertMany, entity, columns)?;

        let start = Instant::now();
        let total = if ctx.transaction_for(self.transactions.pool_key()).is_some() {
            self.insert_rows(ctx, &setup, &insert, rows).await?
        } else {
            let mut own = TransactionContext::new();
            self.transactions.begin(&mut own).await?;
            match self.insert_rows(&mut own, &setup, &insert, rows).await {
                Ok(total) => {
                    self.commit(&mut own).await?;
                    total
                }
                Err(e) => {
                    if let Err(rollback_err) = self.transactions.rollback(&mut own).await {
                        error!(entity, error = %rollback_err, "Rollback after failed bulk insert failed");
                    }
                    return Err(e);
                }
            }
        };
        info!(
            entity,
            rows = rows.len(),
            rows_affected = total,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Bulk insert complete"
        );
        Ok(json!({ "rows_affected": total }))
    }

    pub async fn find(
        &self,
        ctx: &mut TransactionContext,
        entity: &str,
        filter: Option<&Where>,
        order_by: Option<&str>,
        limit: Option<i64>,
    ) -> QueryResult<JsonValue> {
        let stmt = sql::select(self.dialect, entity, filter, order_by, limit)?;
        Ok(self.execute_statement(ctx, &stmt).await?.into_json())
    }

    pub async fn delete(
        &self,
        ctx: &mut TransactionContext,
        entity: &str,
        filter: &Where,
    ) -> QueryResult<JsonValue> {
        let stmt = sql::delete(self.dialect, entity, filter)?;
        Ok(self.execute_statement(ctx, &stmt).await?.into_json())
    }

    pub async fn begin(&self, ctx: &mut TransactionContext) -> QueryResult<()> {
        self.transactions.begin(ctx).await
    }

    /// Commit, then trust the tables set up inside the transaction.
    pub async fn commit(&self, ctx: &mut TransactionContext) -> QueryResult<()> {
        let tables = self.transactions.commit(ctx).await?;
        self.cache.lock().known_tables.extend(tables);
        Ok(())
    }

    /// Roll back; tables set up inside the transaction are forgotten.
    pub async fn rollback(&self, ctx: &mut TransactionContext) -> QueryResult<()> {
        self.transactions.rollback(ctx).await
    }

    async fn insert_rows(
        &self,
        ctx: &mut TransactionContext,
        setup: &TableSetup,
        insert: &str,
        rows: &[Record],
    ) -> QueryResult<u64> {
        self.ensure_table(ctx, setup).await?;
        let mut total = 0;
        for row in rows {
            total += self.run(ctx, insert, row).await?.rows_affected();
        }
        Ok(total)
    }

    async fn execute_statement(
        &self,
        ctx: &mut TransactionContext,
        stmt: &SqlStatement,
    ) -> QueryResult<Outcome> {
        if let Some(setup) = &stmt.setup {
            self.ensure_table(ctx, setup).await?;
        }
        self.run(ctx, &stmt.text, &stmt.params).await
    }

    async fn ensure_table(&self, ctx: &mut TransactionContext, setup: &TableSetup) -> QueryResult<()> {
        if self.is_known_table(&setup.table) {
            return Ok(());
        }
        let in_transaction = ctx.transaction_for(self.transactions.pool_key()).is_some();
        if in_transaction && ctx.has_pending_table(&setup.table) {
            return Ok(());
        }

        self.run(ctx, &setup.ddl, &Record::new()).await?;
        self.schema_setups.fetch_add(1, Ordering::Relaxed);
        if in_transaction {
            ctx.record_table(&setup.table);
        } else {
            self.cache.lock().known_tables.insert(setup.table.clone());
        }
        Ok(())
    }

    fn is_known_table(&self, table: &str) -> bool {
        self.cache.lock().known_tables.contains(table)
    }

    fn statement(&self, kind: StatementKind, entity: &str, columns: Vec<String>) -> QueryResult<String> {
        let key = StatementKey {
            kind,
            entity: entity.to_string(),
            columns,
        };
        let mut cache = self.cache.lock();
        if let Some(text) = cache.statements.get(&key) {
            return Ok(text.clone());
        }
        let refs: Vec<&str> = key.columns.iter().map(String::as_str).collect();
        let text = sql::insert_text(self.dialect, entity, &refs)?;
        cache.statements.insert(key, text.clone());
        Ok(text)
    }

    /// Run named-placeholder SQL in the context's transaction on this
    /// database, or on a pooled connection in autocommit mode.
    async fn run(
        &self,
        ctx: &mut TransactionContext,
        sql: &str,
        params: &Record,
    ) -> QueryResult<Outcome> {
        let (positional, values) = bind_named(sql, params, self.dialect)?;
        if self.echo {
            info!(backend = %self.dialect, context_id = %ctx.id(), sql = %sql, "Statement");
        }
        match ctx.transaction_for(self.transactions.pool_key()) {
            Some(tx) => executor::run_in_transaction(tx, &positional, &values).await,
            None => executor::run_on_pool(&self.pool, &positional, &values).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolOptions;

    async fn adapter() -> SqlAdapter {
        let registry = EngineRegistry::new();
        SqlAdapter::connect(
            ConnectionDescriptor::new("sqlite://", PoolOptions::default()),
            &registry,
        )
        .await
        .unwrap()
    }

    fn record(value: JsonValue) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let adapter = adapter().await;
        let mut ctx = TransactionContext::new();
        let created = adapter
            .create(&mut ctx, "Orders", &record(json!({"order_id": 101, "customer": "A", "paid": true})))
            .await
            .unwrap();
        assert_eq!(created, json!({"rows_affected": 1}));

        let filter = Where::from(record(json!({"paid": true})));
        let rows = adapter
            .find(&mut ctx, "Orders", Some(&filter), None, None)
            .await
            .unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["order_id"], json!(101));
        assert_eq!(rows[0]["customer"], json!("A"));
    }

    #[tokio::test]
    async fn test_repeated_create_reuses_statement_and_table() {
        let adapter = adapter().await;
        let mut ctx = TransactionContext::new();
        for id in 0..3 {
            adapter
                .create(&mut ctx, "Items", &record(json!({"item": id, "label": "x"})))
                .await
                .unwrap();
        }
        assert_eq!(adapter.schema_setups(), 1);
        assert_eq!(adapter.cached_statements(), 1);
    }

    #[tokio::test]
    async fn test_create_many_shares_field_order() {
        let adapter = adapter().await;
        let mut ctx = TransactionContext::new();
        let rows = vec![
            record(json!({"n": 1, "tag": "a"})),
            record(json!({"n": 2, "tag": "b"})),
        ];
        let result = adapter.create_many(&mut ctx, "Bulk", &rows).await.unwrap();
        assert_eq!(result, json!({"rows_affected": 2}));

        let mixed = vec![record(json!({"n": 3, "tag": "c"})), record(json!({"tag": "d", "n": 4}))];
        let err = adapter.create_many(&mut ctx, "Bulk", &mixed).await.unwrap_err();
        assert!(matches!(err, QueryError::Validation { .. }));
        assert!(adapter.create_many(&mut ctx, "Bulk", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_bulk_insert_leaves_nothing_behind() {
        let adapter = adapter().await;
        let mut ctx = TransactionContext::new();
        adapter
            .run_native(
                &mut ctx,
                "CREATE TABLE Strict (id INTEGER PRIMARY KEY, code TEXT UNIQUE)".into(),
                &Record::new(),
            )
            .await
            .unwrap();
        let rows = vec![
            record(json!({"code": "a"})),
            record(json!({"code": "a"})),
        ];
        assert!(adapter.create_many(&mut ctx, "Strict", &rows).await.is_err());
        assert!(!ctx.in_transaction());

        let found = adapter.find(&mut ctx, "Strict", None, None, None).await.unwrap();
        assert_eq!(found, json!([]));
    }

    #[tokio::test]
    async fn test_uql_create_and_find() {
        let adapter = adapter().await;
        let mut ctx = TransactionContext::new();
        adapter
            .execute_uql(&mut ctx, "CREATE Users {name: 'Bo', age: 31}")
            .await
            .unwrap();
        let rows = adapter
            .execute_uql(&mut ctx, "FIND Users WHERE age > 30 ORDER BY name LIMIT 1")
            .await
            .unwrap();
        assert_eq!(rows[0]["name"], json!("Bo"));
    }

    #[tokio::test]
    async fn test_run_native_rejects_operation_objects() {
        let adapter = adapter().await;
        let mut ctx = TransactionContext::new();
        let err = adapter
            .run_native(&mut ctx, json!({"find": "x"}).into(), &Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Validation { .. }));
        assert!(adapter.run_native(&mut ctx, "  ".into(), &Record::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_rollback_forgets_tables_created_inside() {
        let adapter = adapter().await;
        let mut ctx = TransactionContext::new();
        adapter.begin(&mut ctx).await.unwrap();
        adapter
            .create(&mut ctx, "Temp", &record(json!({"v": 1})))
            .await
            .unwrap();
        adapter.rollback(&mut ctx).await.unwrap();
        assert!(!adapter.is_known_table("Temp"));

        adapter
            .create(&mut ctx, "Temp", &record(json!({"v": 2})))
            .await
            .unwrap();
        assert_eq!(adapter.schema_setups(), 2);
        assert!(adapter.is_known_table("Temp"));
    }
}
