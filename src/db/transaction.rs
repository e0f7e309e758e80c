//! Transaction state for relational backends.
//!
//! A [`TransactionContext`] is the caller's logical execution context. It is
//! passed by `&mut` into every operation that may take part in a transaction
//! and holds at most one open transaction. [`TransactionManager`] drives the
//! `IDLE -> IN_TRANSACTION -> IDLE` transitions for one pool.

use chrono::{DateTime, Utc};
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::pool::DbPool;
use crate::error::{QueryError, QueryResult};
use crate::models::DatabaseType;

/// Database-specific transaction wrapper.
pub enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    SQLite(Transaction<'static, Sqlite>),
}

impl DbTransaction {
    /// Check out a connection and open a transaction on it.
    pub async fn begin(pool: &DbPool) -> QueryResult<Self> {
        Ok(match pool {
            DbPool::MySql(p) => DbTransaction::MySql(p.begin().await?),
            DbPool::Postgres(p) => DbTransaction::Postgres(p.begin().await?),
            DbPool::SQLite(p) => DbTransaction::SQLite(p.begin().await?),
        })
    }

    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbTransaction::MySql(_) => DatabaseType::MySQL,
            DbTransaction::Postgres(_) => DatabaseType::PostgreSQL,
            DbTransaction::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Commit; the connection returns to the pool whatever the outcome.
    pub async fn commit(self) -> QueryResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await?,
            DbTransaction::Postgres(tx) => tx.commit().await?,
            DbTransaction::SQLite(tx) => tx.commit().await?,
        }
        Ok(())
    }

    /// Roll back; the connection returns to the pool whatever the outcome.
    pub async fn rollback(self) -> QueryResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await?,
            DbTransaction::Postgres(tx) => tx.rollback().await?,
            DbTransaction::SQLite(tx) => tx.rollback().await?,
        }
        Ok(())
    }
}

impl std::fmt::Debug for DbTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DbTransaction").field(&self.db_type()).finish()
    }
}

#[derive(Debug)]
struct ActiveTransaction {
    transaction: DbTransaction,
    /// Connection string of the pool the transaction was opened on.
    pool_key: String,
    started_at: DateTime<Utc>,
    /// Tables set up inside the transaction; only trusted after commit.
    pending_tables: Vec<String>,
}

/// One logical execution context. Not `Clone`: a transaction handle is never
/// observable from two contexts.
#[derive(Debug)]
pub struct TransactionContext {
    id: String,
    active: Option<ActiveTransaction>,
}

impl TransactionContext {
    pub fn new() -> Self {
        Self {
            id: format!("ctx_{}", Uuid::new_v4().simple()),
            active: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn in_transaction(&self) -> bool {
        self.active.is_some()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.active.as_ref().map(|a| a.started_at)
    }

    /// The open transaction, if it was opened on the pool identified by `pool_key`.
    pub(crate) fn transaction_for(&mut self, pool_key: &str) -> Option<&mut DbTransaction> {
        self.active
            .as_mut()
            .filter(|a| a.pool_key == pool_key)
            .map(|a| &mut a.transaction)
    }

    /// Remember a table created inside the open transaction.
    pub(crate) fn record_table(&mut self, table: &str) {
        if let Some(active) = self.active.as_mut() {
            active.pending_tables.push(table.to_string());
        }
    }

    pub(crate) fn has_pending_table(&self, table: &str) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.pending_tables.iter().any(|t| t == table))
    }
}

impl Default for TransactionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Begin/commit/rollback for one pool.
#[derive(Debug, Clone)]
pub struct TransactionManager {
    pool: DbPool,
    pool_key: String,
}

impl TransactionManager {
    pub fn new(pool: DbPool, pool_key: impl Into<String>) -> Self {
        Self {
            pool,
            pool_key: pool_key.into(),
        }
    }

    pub fn pool_key(&self) -> &str {
        &self.pool_key
    }

    /// `IDLE -> IN_TRANSACTION`. Fails if the context already has a transaction.
    pub async fn begin(&self, ctx: &mut TransactionContext) -> QueryResult<()> {
        if ctx.active.is_some() {
            return Err(QueryError::transaction(format!(
                "A transaction is already active in context {}",
                ctx.id
            )));
        }
        let transaction = DbTransaction::begin(&self.pool).await.map_err(|e| {
            QueryError::transaction(format!("Failed to begin transaction: {}", e))
        })?;
        ctx.active = Some(ActiveTransaction {
            transaction,
            pool_key: self.pool_key.clone(),
            started_at: Utc::now(),
            pending_tables: Vec::new(),
        });
        info!(context_id = %ctx.id, backend = %self.pool.db_type(), "Transaction started");
        Ok(())
    }

    /// `IN_TRANSACTION -> IDLE`, committing. Returns the tables created inside
    /// the transaction. The handle is cleared even when the commit fails.
    pub async fn commit(&self, ctx: &mut TransactionContext) -> QueryResult<Vec<String>> {
        let active = self.take(ctx, "commit")?;
        let duration_ms = (Utc::now() - active.started_at).num_milliseconds();
        active.transaction.commit().await.map_err(|e| {
            QueryError::transaction(format!("Commit failed: {}", e))
        })?;
        info!(context_id = %ctx.id, duration_ms, "Transaction committed");
        Ok(active.pending_tables)
    }

    /// `IN_TRANSACTION -> IDLE`, rolling back. The handle is cleared even when
    /// the rollback fails.
    pub async fn rollback(&self, ctx: &mut TransactionContext) -> QueryResult<()> {
        let active = self.take(ctx, "rollback")?;
        if let Err(e) = active.transaction.rollback().await {
            warn!(context_id = %ctx.id, error = %e, "Rollback failed");
            return Err(QueryError::transaction(format!("Rollback failed: {}", e)));
        }
        info!(context_id = %ctx.id, "Transaction rolled back");
        Ok(())
    }

    fn take(&self, ctx: &mut TransactionContext, action: &str) -> QueryResult<ActiveTransaction> {
        match ctx.active.as_ref() {
            None => Err(QueryError::transaction(format!(
                "No active transaction to {} in context {}",
                action, ctx.id
            ))),
            Some(active) if active.pool_key != self.pool_key => {
                Err(QueryError::transaction(format!(
                    "Context {} has a transaction open on a different connection",
                    ctx.id
                )))
            }
            Some(_) => ctx
                .active
                .take()
                .ok_or_else(|| QueryError::transaction("Transaction handle vanished")),
        }
    }
}
