//! UQL tokenizer.

/// Byte range of a token in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Find,
    Create,
    Delete,
    Update,
    Where,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    Set,
    And,
    Or,
    Has,
    /// Bare word: identifier, number or unquoted literal.
    Word,
    /// Single- or double-quoted literal, quotes included in the text.
    Quoted,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Gt,
    Lt,
    Eq,
    Eof,
    /// Unterminated quote.
    Error,
}

impl TokenKind {
    fn keyword(word: &str) -> Option<Self> {
        let kind = match word.to_ascii_uppercase().as_str() {
            "FIND" => Self::Find,
            "CREATE" => Self::Create,
            "DELETE" => Self::Delete,
            "UPDATE" => Self::Update,
            "WHERE" => Self::Where,
            "ORDER" => Self::Order,
            "BY" => Self::By,
            "ASC" => Self::Asc,
            "DESC" => Self::Desc,
            "LIMIT" => Self::Limit,
            "SET" => Self::Set,
            "AND" => Self::And,
            "OR" => Self::Or,
            "HAS" => Self::Has,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            Self::Find
                | Self::Create
                | Self::Delete
                | Self::Update
                | Self::Where
                | Self::Order
                | Self::By
                | Self::Asc
                | Self::Desc
                | Self::Limit
                | Self::Set
                | Self::And
                | Self::Or
                | Self::Has
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token.
    pub text: String,
    pub span: Span,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '{' | '}' | ':' | ',' | '>' | '<' | '=' | '"' | '\'')
}

pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    /// Produce the next token; `Eof` repeats once input is exhausted.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.pos;
        let Some(c) = self.peek_char() else {
            return self.token(TokenKind::Eof, start);
        };

        let punct = match c {
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            ':' => Some(TokenKind::Colon),
            ',' => Some(TokenKind::Comma),
            '>' => Some(TokenKind::Gt),
            '<' => Some(TokenKind::Lt),
            '=' => Some(TokenKind::Eq),
            _ => None,
        };
        if let Some(kind) = punct {
            self.pos += c.len_utf8();
            return self.token(kind, start);
        }

        if c == '"' || c == '\'' {
            self.pos += c.len_utf8();
            // a doubled quote inside the literal stands for one quote character
            loop {
                match self.source[self.pos..].find(c) {
                    Some(offset) => {
                        self.pos += offset + c.len_utf8();
                        if self.peek_char() == Some(c) {
                            self.pos += c.len_utf8();
                            continue;
                        }
                        return self.token(TokenKind::Quoted, start);
                    }
                    None => {
                        self.pos = self.source.len();
                        return self.token(TokenKind::Error, start);
                    }
                }
            }
        }

        while let Some(c) = self.peek_char() {
            if is_delimiter(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        let kind = TokenKind::keyword(&self.source[start..self.pos]).unwrap_or(TokenKind::Word);
        self.token(kind, start)
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            text: self.source[start..self.pos].to_string(),
            span: Span {
                start,
                end: self.pos,
            },
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }
}
