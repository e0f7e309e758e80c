//! Statement execution against a pool or an open transaction.
//!
//! Each engine has its own submodule working on a concrete connection type so
//! rows decode with the engine's native types.

use serde_json::{Value as JsonValue, json};
use tracing::debug;

use crate::db::pool::DbPool;
use crate::db::transaction::DbTransaction;
use crate::error::QueryResult;
use crate::models::{QueryParam, Record};

/// Result of one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows(Vec<Record>),
    Affected(u64),
}

impl Outcome {
    pub fn rows_affected(&self) -> u64 {
        match self {
            Outcome::Rows(_) => 0,
            Outcome::Affected(n) => *n,
        }
    }

    /// Rows become an array of objects, everything else `{"rows_affected": n}`.
    pub fn into_json(self) -> JsonValue {
        match self {
            Outcome::Rows(rows) => JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect()),
            Outcome::Affected(n) => json!({ "rows_affected": n }),
        }
    }
}

const ROW_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "PRAGMA", "SHOW", "EXPLAIN", "VALUES", "DESCRIBE", "DESC",
];

/// Whether a statement produces a result set.
pub fn returns_rows(sql: &str) -> bool {
    let upper = sql.trim_start().trim_start_matches('(').to_ascii_uppercase();
    let first = upper
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    ROW_KEYWORDS.contains(&first)
        || upper
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .any(|word| word == "RETURNING")
}

/// Run positional SQL on a pooled connection.
pub async fn run_on_pool(pool: &DbPool, sql: &str, params: &[QueryParam]) -> QueryResult<Outcome> {
    let rows = returns_rows(sql);
    debug!(sql = %sql, params = params.len(), "Executing statement");
    match pool {
        DbPool::MySql(p) => {
            let mut conn = p.acquire().await?;
            mysql::run(&mut conn, sql, params, rows).await
        }
        DbPool::Postgres(p) => {
            let mut conn = p.acquire().await?;
            postgres::run(&mut conn, sql, params, rows).await
        }
        DbPool::SQLite(p) => {
            let mut conn = p.acquire().await?;
            sqlite::run(&mut conn, sql, params, rows).await
        }
    }
}

/// Run positional SQL inside an open transaction.
pub async fn run_in_transaction(
    tx: &mut DbTransaction,
    sql: &str,
    params: &[QueryParam],
) -> QueryResult<Outcome> {
    let rows = returns_rows(sql);
    debug!(sql = %sql, params = params.len(), "Executing statement in transaction");
    match tx {
        DbTransaction::MySql(tx) => mysql::run(tx, sql, params, rows).await,
        DbTransaction::Postgres(tx) => postgres::run(tx, sql, params, rows).await,
        DbTransaction::SQLite(tx) => sqlite::run(tx, sql, params, rows).await,
    }
}

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use crate::db::types::RowToJson;
    use sqlx::MySqlConnection;

    pub async fn run(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[QueryParam],
        rows: bool,
    ) -> QueryResult<Outcome> {
        let query = params.iter().fold(sqlx::query(sql), bind_mysql_param);
        if rows {
            let fetched = query.fetch_all(&mut *conn).await?;
            Ok(Outcome::Rows(fetched.iter().map(RowToJson::to_record).collect()))
        } else {
            Ok(Outcome::Affected(query.execute(&mut *conn).await?.rows_affected()))
        }
    }
}

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use crate::db::types::RowToJson;
    use sqlx::PgConnection;

    pub async fn run(
        conn: &mut PgConnection,
        sql: &str,
        params: &[QueryParam],
        rows: bool,
    ) -> QueryResult<Outcome> {
        let query = params.iter().fold(sqlx::query(sql), bind_postgres_param);
        if rows {
            let fetched = query.fetch_all(&mut *conn).await?;
            Ok(Outcome::Rows(fetched.iter().map(RowToJson::to_record).collect()))
        } else {
            Ok(Outcome::Affected(query.execute(&mut *conn).await?.rows_affected()))
        }
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use crate::db::types::RowToJson;
    use sqlx::SqliteConnection;

    pub async fn run(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[QueryParam],
        rows: bool,
    ) -> QueryResult<Outcome> {
        let query = params.iter().fold(sqlx::query(sql), bind_sqlite_param);
        if rows {
            let fetched = query.fetch_all(&mut *conn).await?;
            Ok(Outcome::Rows(fetched.iter().map(RowToJson::to_record).collect()))
        } else {
            Ok(Outcome::Affected(query.execute(&mut *conn).await?.rows_affected()))
        }
    }
}
