//! T-SQL (SQL Server 2012+ / Azure SQL) dialect.
//!
//! T-SQL differences from ANSI:
//! - Square bracket identifier quoting (`[name]`)
//! - `@name` parameters
//! - TOP for simple limiting, OFFSET FETCH for paging (requires ORDER BY)
//! - Row locks are table hints: `WITH (UPDLOCK, ROWLOCK)`
//! - `SCOPE_IDENTITY()` for the last identity value

use super::helpers;
use super::{LimitStyle, PagingStyle, PlaceholderStyle, RowLockStyle, SqlDialect};
use crate::sql::token::TokenStream;

/// T-SQL (SQL Server) dialect.
#[derive(Debug, Clone, Copy)]
pub struct TSql;

impl SqlDialect for TSql {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Named
    }

    fn paging_style(&self) -> PagingStyle {
        PagingStyle::OffsetFetch
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::Top
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_tsql(limit, offset)
    }

    fn row_lock_style(&self) -> RowLockStyle {
        RowLockStyle::TableHint
    }

    fn supports_skip_locked(&self) -> bool {
        // READPAST
        true
    }

    fn identity_function(&self) -> Option<&'static str> {
        Some("SCOPE_IDENTITY()")
    }

    fn supports_stored_procedures(&self) -> bool {
        true
    }
}
