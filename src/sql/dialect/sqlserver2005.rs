//! SQL Server 2005/2008 dialect.
//!
//! Same syntax as [`TSql`](super::TSql) except that OFFSET FETCH does not
//! exist yet: skipping rows needs a `ROW_NUMBER() OVER (ORDER BY ...)`
//! windowing rewrite.

use super::helpers;
use super::{LimitStyle, PagingStyle, PlaceholderStyle, RowLockStyle, SqlDialect};

/// SQL Server 2005 dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlServer2005;

impl SqlDialect for SqlServer2005 {
    fn name(&self) -> &'static str {
        "sqlserver2005"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Named
    }

    fn paging_style(&self) -> PagingStyle {
        PagingStyle::RowNumber
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::Top
    }

    fn row_lock_style(&self) -> RowLockStyle {
        RowLockStyle::TableHint
    }

    fn supports_skip_locked(&self) -> bool {
        true
    }

    fn identity_function(&self) -> Option<&'static str> {
        Some("SCOPE_IDENTITY()")
    }

    fn supports_stored_procedures(&self) -> bool {
        true
    }
}
