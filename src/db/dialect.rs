//! SQL dialect details: identifier quoting, placeholders and inferred column types.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use std::fmt;

use crate::models::DatabaseType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Sqlite,
    Postgres,
    Mysql,
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlDialect::Sqlite => write!(f, "sqlite"),
            SqlDialect::Postgres => write!(f, "postgres"),
            SqlDialect::Mysql => write!(f, "mysql"),
        }
    }
}

impl From<DatabaseType> for SqlDialect {
    fn from(db_type: DatabaseType) -> Self {
        match db_type {
            DatabaseType::SQLite => SqlDialect::Sqlite,
            DatabaseType::PostgreSQL => SqlDialect::Postgres,
            DatabaseType::MySQL => SqlDialect::Mysql,
        }
    }
}

impl SqlDialect {
    /// Quote an identifier that has already passed identifier validation.
    pub fn quote(&self, name: &str) -> String {
        match self {
            SqlDialect::Mysql => format!("`{}`", name.replace('`', "``")),
            SqlDialect::Sqlite | SqlDialect::Postgres => {
                format!("\"{}\"", name.replace('"', "\"\""))
            }
        }
    }

    /// Auto-increment primary key column added to every created table.
    pub fn primary_key_column(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT",
            SqlDialect::Postgres => "\"id\" SERIAL PRIMARY KEY",
            SqlDialect::Mysql => "`id` INT PRIMARY KEY AUTO_INCREMENT",
        }
    }

    /// Column type inferred from a sample value.
    pub fn column_type(&self, value: &JsonValue) -> &'static str {
        match (self, value) {
            (SqlDialect::Sqlite, JsonValue::Bool(_)) => "INTEGER",
            (SqlDialect::Postgres, JsonValue::Bool(_)) => "BOOLEAN",
            (SqlDialect::Mysql, JsonValue::Bool(_)) => "BOOLEAN",

            (SqlDialect::Sqlite, JsonValue::Number(n)) if is_integer(n) => "INTEGER",
            (SqlDialect::Postgres, JsonValue::Number(n)) if is_integer(n) => "INTEGER",
            (SqlDialect::Mysql, JsonValue::Number(n)) if is_integer(n) => "INT",

            (SqlDialect::Sqlite, JsonValue::Number(_)) => "REAL",
            (SqlDialect::Postgres, JsonValue::Number(_)) => "DOUBLE PRECISION",
            (SqlDialect::Mysql, JsonValue::Number(_)) => "DOUBLE",

            (SqlDialect::Sqlite, _) => "TEXT",
            (SqlDialect::Postgres, _) => "TEXT",
            (SqlDialect::Mysql, _) => "VARCHAR(255)",
        }
    }

    /// Positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::Postgres => format!("${}", index),
            SqlDialect::Sqlite | SqlDialect::Mysql => "?".to_string(),
        }
    }

    /// Get the sqlparser dialect for this engine.
    pub fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::Postgres => Box::new(PostgreSqlDialect {}),
            SqlDialect::Mysql => Box::new(MySqlDialect {}),
            SqlDialect::Sqlite => Box::new(SQLiteDialect {}),
        }
    }
}

fn is_integer(n: &serde_json::Number) -> bool {
    n.is_i64() || n.is_u64()
}
