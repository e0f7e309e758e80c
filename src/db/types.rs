//! Row decoding into JSON records.
//!
//! Column types are first classified into a [`TypeCategory`], then a
//! per-engine decoder extracts the value. Anything unrecognized falls back to
//! text.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo};

use crate::models::{DatabaseType, Record};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Null,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_ascii_lowercase();
    match lower.as_str() {
        "null" => TypeCategory::Null,
        "bool" | "boolean" => TypeCategory::Boolean,
        "json" | "jsonb" => TypeCategory::Json,
        "real" | "float4" | "float8" | "double precision" => TypeCategory::Float,
        "bytea" => TypeCategory::Binary,
        // SQLite's NUMERIC affinity holds floats
        "numeric" if db == DatabaseType::SQLite => TypeCategory::Float,
        _ if lower.contains("decimal") || lower.contains("numeric") => TypeCategory::Decimal,
        _ if lower.contains("char") || lower.contains("text") => TypeCategory::Text,
        _ if lower.contains("int") || lower.contains("serial") => TypeCategory::Integer,
        _ if lower.contains("float") || lower.contains("double") => TypeCategory::Float,
        _ if lower.contains("blob") || lower.contains("binary") => TypeCategory::Binary,
        _ => TypeCategory::Text,
    }
}

/// Binary columns are rendered as base64 text.
pub fn encode_binary(bytes: &[u8]) -> JsonValue {
    JsonValue::String(STANDARD.encode(bytes))
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// DECIMAL/NUMERIC kept as its exact text representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        categorize_type(ty.name(), DatabaseType::MySQL) == TypeCategory::Decimal
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(RawDecimal(<&str as Decode<sqlx::MySql>>::decode(value)?.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        categorize_type(ty.name(), DatabaseType::PostgreSQL) == TypeCategory::Decimal
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(RawDecimal(<&str as Decode<sqlx::Postgres>>::decode(value)?.to_string()))
    }
}

/// Trait for converting database rows to JSON records.
pub trait RowToJson {
    fn to_record(&self) -> Record;
}

impl RowToJson for MySqlRow {
    fn to_record(&self) -> Record {
        self.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), DatabaseType::MySQL);
                (col.name().to_string(), mysql::decode(self, col.ordinal(), category))
            })
            .collect()
    }
}

impl RowToJson for PgRow {
    fn to_record(&self) -> Record {
        self.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                (col.name().to_string(), postgres::decode(self, col.ordinal(), category))
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_record(&self) -> Record {
        self.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                (col.name().to_string(), sqlite::decode(self, col.ordinal(), category))
            })
            .collect()
    }
}

// Each decoder returns Null for SQL NULL and for values it cannot decode.

mod mysql {
    use super::*;

    pub fn decode(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Decimal => row
                .try_get::<Option<RawDecimal>, _>(idx)
                .ok()
                .flatten()
                .map_or(JsonValue::Null, |d| JsonValue::String(d.0)),
            TypeCategory::Integer => integer(row, idx),
            TypeCategory::Boolean => row
                .try_get::<Option<bool>, _>(idx)
                .ok()
                .flatten()
                .map_or(JsonValue::Null, JsonValue::Bool),
            TypeCategory::Float => match row.try_get::<Option<f64>, _>(idx) {
                Ok(Some(v)) => float_value(v),
                _ => row
                    .try_get::<Option<f32>, _>(idx)
                    .ok()
                    .flatten()
                    .map_or(JsonValue::Null, |v| float_value(v as f64)),
            },
            TypeCategory::Binary => row
                .try_get::<Option<Vec<u8>>, _>(idx)
                .ok()
                .flatten()
                .map_or(JsonValue::Null, |b| encode_binary(&b)),
            TypeCategory::Json => row
                .try_get::<Option<JsonValue>, _>(idx)
                .ok()
                .flatten()
                .unwrap_or(JsonValue::Null),
            TypeCategory::Text | TypeCategory::Null => row
                .try_get::<Option<String>, _>(idx)
                .ok()
                .flatten()
                .map_or(JsonValue::Null, JsonValue::String),
        }
    }

    // MySQL integer columns may be signed or unsigned at any width.
    fn integer(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        JsonValue::Null
    }
}

mod postgres {
    use super::*;

    pub fn decode(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Decimal => row
                .try_get::<Option<RawDecimal>, _>(idx)
                .ok()
                .flatten()
                .map_or(JsonValue::Null, |d| JsonValue::String(d.0)),
            TypeCategory::Integer => {
                if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
                    return v.map_or(JsonValue::Null, JsonValue::from);
                }
                if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
                    return v.map_or(JsonValue::Null, JsonValue::from);
                }
                row.try_get::<Option<i16>, _>(idx)
                    .ok()
                    .flatten()
                    .map_or(JsonValue::Null, JsonValue::from)
            }
            TypeCategory::Boolean => row
                .try_get::<Option<bool>, _>(idx)
                .ok()
                .flatten()
                .map_or(JsonValue::Null, JsonValue::Bool),
            TypeCategory::Float => match row.try_get::<Option<f64>, _>(idx) {
                Ok(Some(v)) => float_value(v),
                _ => row
                    .try_get::<Option<f32>, _>(idx)
                    .ok()
                    .flatten()
                    .map_or(JsonValue::Null, |v| float_value(v as f64)),
            },
            TypeCategory::Binary => row
                .try_get::<Option<Vec<u8>>, _>(idx)
                .ok()
                .flatten()
                .map_or(JsonValue::Null, |b| encode_binary(&b)),
            TypeCategory::Json => row
                .try_get::<Option<JsonValue>, _>(idx)
                .ok()
                .flatten()
                .unwrap_or(JsonValue::Null),
            TypeCategory::Text | TypeCategory::Null => row
                .try_get::<Option<String>, _>(idx)
                .ok()
                .flatten()
                .map_or(JsonValue::Null, JsonValue::String),
        }
    }
}

mod sqlite {
    use super::*;

    pub fn decode(row: &SqliteRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Integer => row
                .try_get::<Option<i64>, _>(idx)
                .ok()
                .flatten()
                .map_or(JsonValue::Null, JsonValue::from),
            TypeCategory::Boolean => row
                .try_get::<Option<bool>, _>(idx)
                .ok()
                .flatten()
                .map_or(JsonValue::Null, JsonValue::Bool),
            TypeCategory::Float | TypeCategory::Decimal => row
                .try_get::<Option<f64>, _>(idx)
                .ok()
                .flatten()
                .map_or(JsonValue::Null, float_value),
            TypeCategory::Binary => row
                .try_get::<Option<Vec<u8>>, _>(idx)
                .ok()
                .flatten()
                .map_or(JsonValue::Null, |b| encode_binary(&b)),
            TypeCategory::Json | TypeCategory::Text | TypeCategory::Null => {
                match row.try_get::<Option<String>, _>(idx) {
                    Ok(Some(text)) if category == TypeCategory::Json => {
                        serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
                    }
                    Ok(Some(text)) => JsonValue::String(text),
                    _ => JsonValue::Null,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_inferred_column_types() {
        let cases = [
            ("INTEGER", DatabaseType::SQLite, TypeCategory::Integer),
            ("REAL", DatabaseType::SQLite, TypeCategory::Float),
            ("TEXT", DatabaseType::SQLite, TypeCategory::Text),
            ("NULL", DatabaseType::SQLite, TypeCategory::Null),
            ("INT", DatabaseType::MySQL, TypeCategory::Integer),
            ("DOUBLE", DatabaseType::MySQL, TypeCategory::Float),
            ("VARCHAR", DatabaseType::MySQL, TypeCategory::Text),
            ("TINYTEXT", DatabaseType::MySQL, TypeCategory::Text),
            ("BOOLEAN", DatabaseType::PostgreSQL, TypeCategory::Boolean),
            ("INT4", DatabaseType::PostgreSQL, TypeCategory::Integer),
            ("FLOAT8", DatabaseType::PostgreSQL, TypeCategory::Float),
            ("JSONB", DatabaseType::PostgreSQL, TypeCategory::Json),
        ];
        for (name, db, expected) in cases {
            assert_eq!(categorize_type(name, db), expected, "{name}");
        }
    }

    #[test]
    fn test_numeric_depends_on_engine() {
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
        assert_eq!(
            categorize_type("NUMERIC", DatabaseType::PostgreSQL),
            TypeCategory::Decimal
        );
    }

    #[test]
    fn test_binary_is_base64() {
        assert_eq!(
            encode_binary(b"hello world"),
            JsonValue::String("aGVsbG8gd29ybGQ=".into())
        );
        assert_eq!(encode_binary(&[]), JsonValue::String(String::new()));
    }

    #[test]
    fn test_non_finite_float_becomes_text() {
        assert_eq!(float_value(f64::NAN), JsonValue::String("NaN".into()));
        assert_eq!(float_value(1.5), serde_json::json!(1.5));
    }
}
