//! Recursive-descent UQL parser.

use super::ast::*;
use super::lexer::{Lexer, Token, TokenKind};
use crate::error::{QueryError, QueryResult};
use crate::validator::validate_identifier;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    source: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            source: input,
        }
    }

    /// Parse exactly one statement; trailing input is an error.
    pub fn parse(&mut self) -> QueryResult<Intent> {
        let intent = match self.current.kind {
            TokenKind::Find => self.parse_find()?,
            TokenKind::Create => self.parse_create()?,
            TokenKind::Delete => self.parse_delete()?,
            TokenKind::Update => self.parse_update()?,
            _ => return Err(self.error("Expected FIND, CREATE, DELETE or UPDATE")),
        };
        if self.current.kind != TokenKind::Eof {
            return Err(self.error("Unexpected trailing input"));
        }
        Ok(intent)
    }

    fn parse_find(&mut self) -> QueryResult<Intent> {
        self.expect(TokenKind::Find)?;
        let mut intent = Intent::new(Action::Find, self.parse_identifier()?);

        if self.current.kind == TokenKind::Where {
            self.advance();
            intent.condition = Some(self.parse_condition()?);
        }

        if self.current.kind == TokenKind::Order {
            self.advance();
            self.expect(TokenKind::By)?;
            let field = self.parse_identifier()?;
            let direction = match self.current.kind {
                TokenKind::Asc => {
                    self.advance();
                    SortDirection::Asc
                }
                TokenKind::Desc => {
                    self.advance();
                    SortDirection::Desc
                }
                _ => SortDirection::Asc,
            };
            intent.order_by = Some(OrderBy { field, direction });
        }

        if self.current.kind == TokenKind::Limit {
            self.advance();
            intent.limit = Some(self.parse_limit()?);
        }

        Ok(intent)
    }

    fn parse_create(&mut self) -> QueryResult<Intent> {
        self.expect(TokenKind::Create)?;
        let mut intent = Intent::new(Action::Create, self.parse_identifier()?);
        self.expect(TokenKind::LBrace)?;
        intent.payload = self.parse_assignments()?;
        self.expect(TokenKind::RBrace)?;
        Ok(intent)
    }

    fn parse_delete(&mut self) -> QueryResult<Intent> {
        self.expect(TokenKind::Delete)?;
        let mut intent = Intent::new(Action::Delete, self.parse_identifier()?);
        // an absent filter parses; every code generator refuses it
        if self.current.kind == TokenKind::Where {
            self.advance();
            intent.condition = Some(self.parse_condition()?);
        }
        Ok(intent)
    }

    fn parse_update(&mut self) -> QueryResult<Intent> {
        self.expect(TokenKind::Update)?;
        let mut intent = Intent::new(Action::Update, self.parse_identifier()?);
        self.expect(TokenKind::Set)?;
        intent.payload = self.parse_assignments()?;
        self.expect(TokenKind::Where)?;
        intent.condition = Some(self.parse_condition()?);
        Ok(intent)
    }

    /// `field: value (, field: value)*`
    fn parse_assignments(&mut self) -> QueryResult<Vec<(String, Literal)>> {
        let mut pairs: Vec<(String, Literal)> = Vec::new();
        loop {
            let field = self.parse_identifier()?;
            if pairs.iter().any(|(existing, _)| *existing == field) {
                return Err(QueryError::validation(format!(
                    "Field '{}' assigned more than once",
                    field
                )));
            }
            self.expect(TokenKind::Colon)?;
            let value = self.parse_literal()?;
            pairs.push((field, value));

            if self.current.kind != TokenKind::Comma {
                return Ok(pairs);
            }
            self.advance();
        }
    }

    fn parse_condition(&mut self) -> QueryResult<Condition> {
        let mut groups = vec![self.parse_and_group()?];
        while self.current.kind == TokenKind::Or {
            self.advance();
            groups.push(self.parse_and_group()?);
        }
        Ok(Condition { groups })
    }

    fn parse_and_group(&mut self) -> QueryResult<Vec<Clause>> {
        let mut clauses = vec![self.parse_clause()?];
        while self.current.kind == TokenKind::And {
            self.advance();
            clauses.push(self.parse_clause()?);
        }
        Ok(clauses)
    }

    fn parse_clause(&mut self) -> QueryResult<Clause> {
        if self.current.kind == TokenKind::Has {
            self.advance();
            let field = self.parse_identifier()?;
            return Ok(Clause::Has { field });
        }

        let field = self.parse_identifier()?;
        let op = match self.current.kind {
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Eq => CompareOp::Eq,
            _ => return Err(self.error("Expected '>', '<' or '='")),
        };
        self.advance();
        if op != CompareOp::Eq && self.current.kind == TokenKind::Eq {
            return Err(self.error(&format!(
                "Operator '{}=' is not supported; use '>', '<' or '='",
                op.symbol()
            )));
        }
        let value = self.parse_literal()?;
        Ok(Clause::Compare { field, op, value })
    }

    fn parse_identifier(&mut self) -> QueryResult<String> {
        if self.current.kind != TokenKind::Word {
            return Err(self.error("Expected a name"));
        }
        let name = validate_identifier(&self.current.text)?.to_string();
        self.advance();
        Ok(name)
    }

    fn parse_literal(&mut self) -> QueryResult<Literal> {
        let kind = self.current.kind;
        if kind == TokenKind::Quoted || kind == TokenKind::Word || kind.is_keyword() {
            let literal = Literal::coerce(&self.current.text);
            self.advance();
            Ok(literal)
        } else if kind == TokenKind::Error {
            Err(self.error("Unterminated quoted literal"))
        } else {
            Err(self.error("Expected a value"))
        }
    }

    fn parse_limit(&mut self) -> QueryResult<u64> {
        let limit = match Literal::coerce(&self.current.text) {
            Literal::Int(n) if self.current.kind == TokenKind::Word && n > 0 => n as u64,
            _ => return Err(self.error("LIMIT must be a positive integer")),
        };
        self.advance();
        Ok(limit)
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    fn expect(&mut self, kind: TokenKind) -> QueryResult<()> {
        if self.current.kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("Expected {:?}", kind)))
        }
    }

    fn error(&self, message: &str) -> QueryError {
        let found = match self.current.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("'{}'", self.current.text),
        };
        QueryError::translation(
            format!(
                "{} at offset {}, found {} in: {}",
                message, self.current.span.start, found, self.source
            ),
            "uql",
        )
    }
}
