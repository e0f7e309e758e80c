//! Relational code generation.
//!
//! Entity and field names are validated as identifiers and quoted for the
//! dialect; values are always bound as named parameters. The one exception is
//! [`Where::Raw`], a trusted predicate spliced in verbatim.

use std::sync::LazyLock;

use regex::Regex;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

use super::{SqlStatement, TableSetup, required_filter};
use crate::db::dialect::SqlDialect;
use crate::error::{QueryError, QueryResult};
use crate::models::{Record, Where};
use crate::uql::ast::{Action, Clause, Condition, Intent, OrderBy, SortDirection};
use crate::validator::{validate_identifier, validate_payload};

static ORDER_BY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([A-Za-z_][A-Za-z0-9_]*)(?:\s+(ASC|DESC))?$")
        .expect("order by pattern is valid")
});

/// Compile a UQL intent into a parameterized statement.
pub fn compile(intent: &Intent, dialect: SqlDialect) -> QueryResult<SqlStatement> {
    let table = dialect.quote(validate_identifier(&intent.entity)?);
    match intent.action {
        Action::Find => {
            let mut stmt = SqlStatement::new(format!("SELECT * FROM {}", table));
            if let Some(condition) = intent.filter() {
                let predicate = render_condition(dialect, condition, &mut stmt.params)?;
                stmt.text.push_str(&format!(" WHERE {}", predicate));
            }
            if let Some(order) = &intent.order_by {
                stmt.text.push_str(&order_clause(dialect, order)?);
            }
            if let Some(limit) = intent.limit {
                stmt.text.push_str(" LIMIT :limit_value");
                stmt.params.insert("limit_value".into(), limit.into());
            }
            Ok(stmt)
        }
        Action::Create => {
            let payload = intent.payload_record();
            let columns: Vec<&str> = payload.keys().map(String::as_str).collect();
            let mut stmt = SqlStatement::new(insert_text(dialect, &intent.entity, &columns)?);
            stmt.setup = Some(create_table(dialect, &intent.entity, &payload)?);
            stmt.params = payload;
            Ok(stmt)
        }
        Action::Delete => {
            let condition = required_filter(intent)?;
            let mut stmt = SqlStatement::new(String::new());
            let predicate = render_condition(dialect, condition, &mut stmt.params)?;
            stmt.text = format!("DELETE FROM {} WHERE {}", table, predicate);
            Ok(stmt)
        }
        Action::Update => {
            let condition = required_filter(intent)?;
            let mut stmt = SqlStatement::new(String::new());
            let mut assignments = Vec::with_capacity(intent.payload.len());
            for (field, value) in &intent.payload {
                let param = format!("s_{}", validate_identifier(field)?);
                assignments.push(format!("{} = :{}", dialect.quote(field), param));
                stmt.params.insert(param, value.to_json());
            }
            let predicate = render_condition(dialect, condition, &mut stmt.params)?;
            stmt.text = format!(
                "UPDATE {} SET {} WHERE {}",
                table,
                assignments.join(", "),
                predicate
            );
            Ok(stmt)
        }
    }
}

/// `SELECT` for the adapter-level `find`.
pub fn select(
    dialect: SqlDialect,
    entity: &str,
    filter: Option<&Where>,
    order_by: Option<&str>,
    limit: Option<i64>,
) -> QueryResult<SqlStatement> {
    let table = dialect.quote(validate_identifier(entity)?);
    let mut stmt = SqlStatement::new(format!("SELECT * FROM {}", table));

    if let Some(filter) = filter.filter(|w| !w.is_empty()) {
        let predicate = where_clause(dialect, filter, &mut stmt.params)?;
        stmt.text.push_str(&format!(" WHERE {}", predicate));
    }
    if let Some(clause) = order_by.map(str::trim).filter(|s| !s.is_empty()) {
        stmt.text.push_str(&order_clause(dialect, &parse_order_by(clause)?)?);
    }
    if let Some(limit) = limit {
        if limit <= 0 {
            return Err(QueryError::validation("limit must be a positive integer"));
        }
        stmt.text.push_str(" LIMIT :limit_value");
        stmt.params.insert("limit_value".into(), limit.into());
    }
    Ok(stmt)
}

/// `DELETE` for the adapter-level `delete`; an empty filter is refused.
pub fn delete(dialect: SqlDialect, entity: &str, filter: &Where) -> QueryResult<SqlStatement> {
    let table = dialect.quote(validate_identifier(entity)?);
    if filter.is_empty() {
        return Err(QueryError::validation(
            "delete requires a non-empty where condition",
        ));
    }
    let mut stmt = SqlStatement::new(String::new());
    let predicate = where_clause(dialect, filter, &mut stmt.params)?;
    stmt.text = format!("DELETE FROM {} WHERE {}", table, predicate);
    Ok(stmt)
}

/// `INSERT` text binding one `:column` parameter per column.
pub fn insert_text(dialect: SqlDialect, entity: &str, columns: &[&str]) -> QueryResult<String> {
    let table = dialect.quote(validate_identifier(entity)?);
    let mut quoted = Vec::with_capacity(columns.len());
    let mut placeholders = Vec::with_capacity(columns.len());
    for column in columns {
        quoted.push(dialect.quote(validate_identifier(column)?));
        placeholders.push(format!(":{}", column));
    }
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        quoted.join(", "),
        placeholders.join(", ")
    ))
}

/// `CREATE TABLE IF NOT EXISTS` with one column per payload field.
pub fn create_table(dialect: SqlDialect, entity: &str, payload: &Record) -> QueryResult<TableSetup> {
    validate_identifier(entity)?;
    validate_payload(payload)?;
    let mut columns = vec![dialect.primary_key_column().to_string()];
    for (field, value) in payload {
        if field == "id" {
            continue;
        }
        columns.push(format!(
            "{} {}",
            dialect.quote(field),
            dialect.column_type(value)
        ));
    }
    Ok(TableSetup {
        table: entity.to_string(),
        ddl: format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            dialect.quote(entity),
            columns.join(", ")
        ),
    })
}

/// Parse an `order_by` argument such as `"created DESC"`.
pub fn parse_order_by(clause: &str) -> QueryResult<OrderBy> {
    let caps = ORDER_BY
        .captures(clause.trim())
        .ok_or_else(|| QueryError::validation(format!("Invalid order_by clause: {}", clause)))?;
    let direction = match caps.get(2).map(|m| m.as_str().to_ascii_uppercase()) {
        Some(dir) if dir == "DESC" => SortDirection::Desc,
        _ => SortDirection::Asc,
    };
    Ok(OrderBy {
        field: caps[1].to_string(),
        direction,
    })
}

fn order_clause(dialect: SqlDialect, order: &OrderBy) -> QueryResult<String> {
    Ok(format!(
        " ORDER BY {} {}",
        dialect.quote(validate_identifier(&order.field)?),
        order.direction.keyword()
    ))
}

fn where_clause(dialect: SqlDialect, filter: &Where, params: &mut Record) -> QueryResult<String> {
    match filter {
        Where::Fields(fields) => {
            let mut parts = Vec::with_capacity(fields.len());
            for (idx, (field, value)) in fields.iter().enumerate() {
                let param = format!("w_{}", idx);
                parts.push(format!(
                    "{} = :{}",
                    dialect.quote(validate_identifier(field)?),
                    param
                ));
                params.insert(param, value.clone());
            }
            Ok(parts.join(" AND "))
        }
        Where::Raw(text) => trusted_expression(dialect, text),
    }
}

/// Accept a caller-supplied predicate only if it is one SQL expression.
///
/// The text is spliced into the statement without binding. Nothing stops a
/// trusted caller from writing a bad predicate; the parse only refuses input
/// that would smuggle in a second statement. Comments are refused as well,
/// since a trailing `--` would swallow the ORDER BY and LIMIT appended after it.
fn trusted_expression(dialect: SqlDialect, text: &str) -> QueryResult<String> {
    let parser_dialect = dialect.parser_dialect();
    let tokens = Tokenizer::new(parser_dialect.as_ref(), text)
        .tokenize()
        .map_err(|e| QueryError::validation(format!("Raw where clause does not tokenize: {}", e)))?;
    if tokens.iter().any(|t| {
        matches!(
            t,
            Token::Whitespace(Whitespace::SingleLineComment { .. } | Whitespace::MultiLineComment(_))
        )
    }) {
        return Err(QueryError::validation(
            "Raw where clause must not contain SQL comments",
        ));
    }
    let invalid = |e: sqlparser::parser::ParserError| {
        QueryError::validation(format!("Raw where clause is not a single expression: {}", e))
    };
    let mut parser = Parser::new(parser_dialect.as_ref())
        .try_with_sql(text)
        .map_err(invalid)?;
    parser.parse_expr().map_err(invalid)?;
    parser.expect_token(&Token::EOF).map_err(invalid)?;
    Ok(text.trim().to_string())
}

fn render_condition(
    dialect: SqlDialect,
    condition: &Condition,
    params: &mut Record,
) -> QueryResult<String> {
    let mut groups = Vec::with_capacity(condition.groups.len());
    for group in &condition.groups {
        let mut parts = Vec::with_capacity(group.len());
        for clause in group {
            parts.push(render_clause(dialect, clause, params)?);
        }
        groups.push(parts.join(" AND "));
    }
    Ok(groups.join(" OR "))
}

fn render_clause(dialect: SqlDialect, clause: &Clause, params: &mut Record) -> QueryResult<String> {
    match clause {
        Clause::Has { field } => Ok(format!(
            "{} IS NOT NULL",
            dialect.quote(validate_identifier(field)?)
        )),
        Clause::Compare { field, op, value } => {
            let param = format!("p{}", params.len());
            let sql = format!(
                "{} {} :{}",
                dialect.quote(validate_identifier(field)?),
                op.symbol(),
                param
            );
            params.insert(param, value.to_json());
            Ok(sql)
        }
    }
}
