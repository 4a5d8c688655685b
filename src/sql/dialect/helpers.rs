//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use super::super::token::{Token, TokenStream};

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres, DuckDB, SQLite
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: MySQL
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote identifier with square brackets.
/// Used by: T-SQL, SQL Server 2005, SQL Server CE
pub fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

// =============================================================================
// Parameter Placeholders
// =============================================================================

/// Named placeholder: `@p1`.
pub fn placeholder_at(name: &str) -> String {
    format!("@{}", name)
}

/// Numbered placeholder: `$1`.
pub fn placeholder_dollar(ordinal: usize) -> String {
    format!("${}", ordinal)
}

// =============================================================================
// Pagination
// =============================================================================

/// A row count or offset as a literal. Counts beyond `i64::MAX` are clamped;
/// no backend can hold more rows than that.
pub fn row_count(n: u64) -> Token {
    Token::LitInt(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Emit LIMIT ... OFFSET ... (standard SQL).
/// Used by: Postgres, DuckDB, SQLite
pub fn emit_limit_offset_standard(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let mut ts = TokenStream::new();

    if let Some(lim) = limit {
        ts.push(Token::Limit)
            .space()
            .push(row_count(lim));
    }

    if let Some(off) = offset {
        if limit.is_some() {
            ts.space();
        }
        ts.push(Token::Offset)
            .space()
            .push(row_count(off));
    }

    ts
}

/// MySQL cannot OFFSET without LIMIT; an offset-only page uses the
/// documented maximum row count.
pub fn emit_limit_offset_mysql(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    match (limit, offset) {
        (None, Some(off)) => {
            let mut ts = TokenStream::new();
            ts.push(Token::Limit)
                .space()
                .push(Token::Raw(u64::MAX.to_string()))
                .space()
                .push(Token::Offset)
                .space()
                .push(row_count(off));
            ts
        }
        _ => emit_limit_offset_standard(limit, offset),
    }
}

/// SQLite only accepts OFFSET after LIMIT; `LIMIT -1` means no limit.
pub fn emit_limit_offset_sqlite(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    match (limit, offset) {
        (None, Some(off)) => {
            let mut ts = TokenStream::new();
            ts.push(Token::Limit)
                .space()
                .push(Token::LitInt(-1))
                .space()
                .push(Token::Offset)
                .space()
                .push(row_count(off));
            ts
        }
        _ => emit_limit_offset_standard(limit, offset),
    }
}

/// Emit OFFSET ... ROWS FETCH NEXT ... ROWS ONLY (T-SQL style).
/// Used by: T-SQL, SQL Server CE
/// Note: Requires ORDER BY clause
pub fn emit_limit_offset_tsql(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let mut ts = TokenStream::new();

    let off = offset.unwrap_or(0);
    ts.push(Token::Offset)
        .space()
        .push(row_count(off))
        .space()
        .push(Token::Rows);

    if let Some(lim) = limit {
        ts.space()
            .push(Token::Fetch)
            .space()
            .push(Token::Next)
            .space()
            .push(row_count(lim))
            .space()
            .push(Token::Rows)
            .space()
            .push(Token::Only);
    }

    ts
}

/// Emit `TOP (n)` (T-SQL family first-N-rows).
pub fn emit_top(limit: u64) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Top)
        .space()
        .lparen()
        .push(row_count(limit))
        .rparen();
    ts
}

// =============================================================================
// Row Locking
// =============================================================================

/// SQL Server table hint placed after the table name.
pub fn emit_lock_hint_tsql(skip_locked: bool) -> TokenStream {
    let hint = if skip_locked {
        "(UPDLOCK, ROWLOCK, READPAST)"
    } else {
        "(UPDLOCK, ROWLOCK)"
    };
    let mut ts = TokenStream::new();
    ts.push(Token::With).space().push(Token::Raw(hint.into()));
    ts
}

/// `FOR UPDATE [SKIP LOCKED]` placed at the end of the statement.
pub fn emit_for_update(skip_locked: bool) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::For).space().push(Token::Update);
    if skip_locked {
        ts.space().push(Token::SkipLocked);
    }
    ts
}
