//! Tokens the compiler emits.
//!
//! Identifiers and parameters stay symbolic until [`TokenStream::serialize`]
//! is given a dialect, so one compiled shape can be quoted and
//! parameterised for any backend.

use super::dialect::{Dialect, SqlDialect};

/// SQL Token - every element the compiler emits.
///
/// Adding a new variant here will cause compile errors everywhere
/// it needs to be handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    On,
    Join,
    Inner,
    Left,
    GroupBy,
    Having,
    OrderBy,
    Desc,
    Limit,
    Offset,
    Fetch,
    Next,
    Rows,
    Only,
    Top,
    In,
    Between,
    Like,
    IsNull,
    IsNotNull,
    For,
    Update,
    SkipLocked,
    With,
    Over,

    // === Punctuation ===
    Comma,
    Star,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,

    // === Whitespace ===
    Space,

    // === Dynamic Content ===
    /// Simple identifier (table, column, alias)
    Ident(String),
    /// Dotted identifier: `schema.table.column`, `alias.column`, ...
    QualifiedIdent(Vec<String>),
    /// Integer literal (paging bounds only; values are always parameters)
    LitInt(i64),
    /// Bound parameter. `ordinal` is 1-based in statement order.
    Param { name: String, ordinal: usize },

    // === Function Names ===
    FunctionName(String),

    // === Escape Hatch ===
    /// Raw SQL passed directly to output without escaping.
    ///
    /// **Never pass user input to this variant.** Only trusted, static
    /// fragments (lock hints, `ROW_NUMBER()`) belong here.
    Raw(String),
}

impl Token {
    /// Serialize this token to a string for the given dialect.
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            // Keywords
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::Not => "NOT".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Join => "JOIN".into(),
            Token::Inner => "INNER".into(),
            Token::Left => "LEFT".into(),
            Token::GroupBy => "GROUP BY".into(),
            Token::Having => "HAVING".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Desc => "DESC".into(),
            Token::Limit => "LIMIT".into(),
            Token::Offset => "OFFSET".into(),
            Token::Fetch => "FETCH".into(),
            Token::Next => "NEXT".into(),
            Token::Rows => "ROWS".into(),
            Token::Only => "ONLY".into(),
            Token::Top => "TOP".into(),
            Token::In => "IN".into(),
            Token::Between => "BETWEEN".into(),
            Token::Like => "LIKE".into(),
            Token::IsNull => "IS NULL".into(),
            Token::IsNotNull => "IS NOT NULL".into(),
            Token::For => "FOR".into(),
            Token::Update => "UPDATE".into(),
            Token::SkipLocked => "SKIP LOCKED".into(),
            Token::With => "WITH".into(),
            Token::Over => "OVER".into(),

            // Punctuation
            Token::Comma => ",".into(),
            Token::Star => "*".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            // Operators
            Token::Eq => "=".into(),
            Token::Ne => "<>".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Lte => "<=".into(),
            Token::Gte => ">=".into(),

            Token::Space => " ".into(),

            // Dynamic - dialect-specific formatting
            Token::Ident(name) => dialect.quote_identifier(name),
            Token::QualifiedIdent(parts) => parts
                .iter()
                .map(|p| dialect.quote_identifier(p))
                .collect::<Vec<_>>()
                .join("."),
            Token::LitInt(n) => n.to_string(),
            Token::Param { name, ordinal } => dialect.placeholder(name, *ordinal),

            Token::FunctionName(name) => name.to_uppercase(),

            Token::Raw(s) => s.clone(),
        }
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Serialize all tokens to a SQL string.
    pub fn serialize(&self, dialect: Dialect) -> String {
        self.tokens.iter().map(|t| t.serialize(dialect)).collect()
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
    /// Push `token` surrounded by spaces.
    pub fn keyword(&mut self, token: Token) -> &mut Self {
        self.space().push(token).space()
    }
}
