//! Named placeholder rewriting and parameter binding.
//!
//! Generated statements use `:name` placeholders. Before execution they are
//! rewritten into the driver's positional form and the values are bound in
//! order.

use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

use crate::db::dialect::SqlDialect;
use crate::error::{QueryError, QueryResult};
use crate::models::{QueryParam, Record};

/// Rewrite `:name` placeholders into positional ones and collect their values.
///
/// Quoted strings and identifiers are copied verbatim, as are PostgreSQL
/// `::type` casts. A placeholder without a value fails.
///
/// PostgreSQL infers a parameter's type from the bound value, so a null bound
/// as text would be refused by an integer or boolean column. Null values are
/// written as a `NULL` literal there instead and take no placeholder.
pub fn bind_named(
    sql: &str,
    params: &Record,
    dialect: SqlDialect,
) -> QueryResult<(String, Vec<QueryParam>)> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' if chars
                .get(i + 1)
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
            {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let value = params.get(&name).ok_or_else(|| {
                    QueryError::execution(format!("No value bound for parameter :{}", name), None)
                })?;
                let param = QueryParam::from(value);
                if param.is_null() && dialect == SqlDialect::Postgres {
                    out.push_str("NULL");
                } else {
                    values.push(param);
                    out.push_str(&dialect.placeholder(values.len()));
                }
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    Ok((out, values))
}

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        // no JSON column type; stored as text
        QueryParam::Json(v) => query.bind(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_positional_per_dialect() {
        let p = params(json!({"p0": 25, "p1": true}));
        let sql = "SELECT * FROM \"User\" WHERE \"age\" > :p0 AND \"active\" = :p1";

        let (text, values) = bind_named(sql, &p, SqlDialect::Sqlite).unwrap();
        assert_eq!(text, "SELECT * FROM \"User\" WHERE \"age\" > ? AND \"active\" = ?");
        assert_eq!(values, vec![QueryParam::Int(25), QueryParam::Bool(true)]);

        let (text, _) = bind_named(sql, &p, SqlDialect::Postgres).unwrap();
        assert_eq!(text, "SELECT * FROM \"User\" WHERE \"age\" > $1 AND \"active\" = $2");
    }

    #[test]
    fn test_order_follows_text_not_map() {
        let p = params(json!({"b": 2, "a": 1}));
        let (_, values) = bind_named("VALUES (:a, :b)", &p, SqlDialect::Mysql).unwrap();
        assert_eq!(values, vec![QueryParam::Int(1), QueryParam::Int(2)]);
    }

    #[test]
    fn test_quoted_regions_and_casts_untouched() {
        let p = params(json!({"id": 7}));
        let (text, values) = bind_named(
            "SELECT ':nope', \":also\", x::text FROM t WHERE id = :id",
            &p,
            SqlDialect::Postgres,
        )
        .unwrap();
        assert_eq!(text, "SELECT ':nope', \":also\", x::text FROM t WHERE id = $1");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_missing_value_is_execution_error() {
        let err = bind_named("SELECT :missing", &Record::new(), SqlDialect::Sqlite).unwrap_err();
        assert!(matches!(err, QueryError::Execution { .. }));
    }

    #[test]
    fn test_postgres_null_written_inline() {
        let p = params(json!({"a": 1, "b": null, "c": "x"}));
        let sql = "INSERT INTO t (a, b, c) VALUES (:a, :b, :c)";

        let (text, values) = bind_named(sql, &p, SqlDialect::Postgres).unwrap();
        assert_eq!(text, "INSERT INTO t (a, b, c) VALUES ($1, NULL, $2)");
        assert_eq!(values, vec![QueryParam::Int(1), QueryParam::String("x".into())]);

        let (text, values) = bind_named(sql, &p, SqlDialect::Sqlite).unwrap();
        assert_eq!(text, "INSERT INTO t (a, b, c) VALUES (?, ?, ?)");
        assert_eq!(values[1], QueryParam::Null);
    }

    #[test]
    fn test_repeated_name_binds_twice() {
        let p = params(json!({"v": "x"}));
        let (text, values) = bind_named("a = :v OR b = :v", &p, SqlDialect::Postgres).unwrap();
        assert_eq!(text, "a = $1 OR b = $2");
        assert_eq!(values.len(), 2);
    }
}
