//! UQL: the small declarative query language of the gateway.
//!
//! ```text
//! FIND   <entity> [WHERE <condition>] [ORDER BY <field> [ASC|DESC]] [LIMIT <int>]
//! CREATE <entity> { <field>: <value>, ... }
//! DELETE <entity> [WHERE <condition>]
//! UPDATE <entity> SET <field>: <value>, ... WHERE <condition>
//! ```
//!
//! Text is tokenized by [`lexer`], parsed into an [`Intent`] by [`parser`] and
//! compiled per backend family by [`codegen`]. [`render`] builds intents from
//! facade arguments and prints them back as UQL text.

pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;
pub mod render;

pub use ast::{Action, Clause, CompareOp, Condition, Intent, Literal, OrderBy, SortDirection};
pub use codegen::{NativeQuery, SqlStatement, TableSetup, Target, compile};

use crate::error::QueryResult;

/// Parse one UQL statement.
pub fn parse(text: &str) -> QueryResult<Intent> {
    parser::Parser::new(text.trim()).parse()
}

/// Parse and compile in one step.
pub fn translate(text: &str, target: Target) -> QueryResult<NativeQuery> {
    compile(&parse(text)?, target)
}
