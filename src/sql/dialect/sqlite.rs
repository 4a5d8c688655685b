//! SQLite SQL dialect.
//!
//! - ANSI identifier quoting (`"`)
//! - `@name` parameters (SQLite also accepts `:name` and `$name`)
//! - LIMIT/OFFSET paging
//! - No row locks (the whole database is locked by a write transaction)
//! - `last_insert_rowid()`

use super::helpers;
use super::{PlaceholderStyle, SqlDialect};
use crate::sql::token::TokenStream;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_sqlite(limit, offset)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Named
    }

    fn identity_function(&self) -> Option<&'static str> {
        Some("last_insert_rowid()")
    }
}
