//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting (`` `name` ``)
//! - Positional `?` parameters
//! - LIMIT ... OFFSET ... for pagination; OFFSET needs a LIMIT
//! - `FOR UPDATE [SKIP LOCKED]` (8.0+)
//! - `LAST_INSERT_ID()` for the last identity value

use super::helpers;
use super::{PlaceholderStyle, RowLockStyle, SqlDialect};
use crate::sql::token::TokenStream;

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Anonymous
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_mysql(limit, offset)
    }

    fn row_lock_style(&self) -> RowLockStyle {
        RowLockStyle::ForUpdate
    }

    fn supports_skip_locked(&self) -> bool {
        true
    }

    fn identity_function(&self) -> Option<&'static str> {
        Some("LAST_INSERT_ID()")
    }

    fn supports_stored_procedures(&self) -> bool {
        true
    }
}
