//! SQL Server Compact Edition (4.0) dialect.
//!
//! Bracket quoting and OFFSET FETCH like T-SQL, but no row locking, one
//! statement per command and `@@IDENTITY` instead of `SCOPE_IDENTITY()`.

use super::helpers;
use super::{LimitStyle, PagingStyle, PlaceholderStyle, SqlDialect};
use crate::sql::token::TokenStream;

/// SQL Server CE dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlCe;

impl SqlDialect for SqlCe {
    fn name(&self) -> &'static str {
        "sqlce"
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

    fn supports_compound_statements(&self) -> bool {
        false
    }

    fn identity_function(&self) -> Option<&'static str> {
        Some("@@IDENTITY")
    }
}
