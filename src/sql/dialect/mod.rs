//! SQL Dialect definitions and capability flags.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to describe its syntax and the
//! features the compiler may rely on:
//!
//! - Identifier quoting: `"` (PG/DuckDB/SQLite), `` ` `` (MySQL), `[]` (T-SQL family)
//! - Parameter placeholders: `@name`, `$n` or `?`
//! - Pagination: TOP, LIMIT/OFFSET, OFFSET FETCH or a ROW_NUMBER rewrite
//! - Row locking: table hints vs `FOR UPDATE`
//! - Compound statements and identity retrieval
//!
//! # Usage
//!
//! ```ignore
//! use dynaquery::sql::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("user");  // "user"
//! ```
//!
//! # Capability Matrix
//!
//! | Dialect | Take only | Skip + take | Row lock | Compound | Identity |
//! |---------|-----------|-------------|----------|----------|----------|
//! | tsql | TOP | OFFSET FETCH | table hint | ✓ | SCOPE_IDENTITY() |
//! | sqlserver2005 | TOP | ROW_NUMBER | table hint | ✓ | SCOPE_IDENTITY() |
//! | sqlce | TOP | OFFSET FETCH | ❌ | ❌ | @@IDENTITY |
//! | postgres | LIMIT | LIMIT/OFFSET | FOR UPDATE | ✓ | LASTVAL() |
//! | mysql | LIMIT | LIMIT/OFFSET | FOR UPDATE | ✓ | LAST_INSERT_ID() |
//! | duckdb | LIMIT | LIMIT/OFFSET | ❌ | ✓ | ❌ |
//! | sqlite | LIMIT | LIMIT/OFFSET | ❌ | ✓ | last_insert_rowid() |

mod duckdb;
pub mod helpers;
mod mysql;
mod postgres;
mod sqlce;
mod sqlite;
mod sqlserver2005;
mod tsql;

pub use duckdb::DuckDb;
pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlce::SqlCe;
pub use sqlite::Sqlite;
pub use sqlserver2005::SqlServer2005;
pub use tsql::TSql;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::token::TokenStream;

/// How a dialect skips rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingStyle {
    /// `LIMIT n OFFSET m`
    LimitOffset,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    OffsetFetch,
    /// `ROW_NUMBER() OVER (ORDER BY ...)` windowing rewrite.
    RowNumber,
}

/// How a dialect returns only the first N rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `SELECT TOP (n) ...`
    Top,
    /// `... LIMIT n`
    Limit,
}

/// How bound parameters appear in SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `@p1` - bound by name.
    Named,
    /// `$1` - bound by position, reusable.
    Numbered,
    /// `?` - bound by position, one value per occurrence.
    Anonymous,
}

/// Where (and whether) a dialect expresses row locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLockStyle {
    Unsupported,
    /// `FROM t WITH (UPDLOCK, ROWLOCK)`
    TableHint,
    /// `... FOR UPDATE`
    ForUpdate,
}

/// SQL dialect trait - defines how SQL constructs are rendered and which
/// features are available.
///
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    ///
    /// - PostgreSQL/DuckDB/SQLite: `"identifier"`
    /// - MySQL: `` `identifier` ``
    /// - T-SQL family: `[identifier]`
    fn quote_identifier(&self, ident: &str) -> String;

    // =========================================================================
    // Parameters
    // =========================================================================

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Numbered
    }

    /// Placeholder text for a bound parameter.
    ///
    /// `name` is the parameter's name (`p1`, `p1_start`, ...), `ordinal` its
    /// 1-based position in the statement.
    fn placeholder(&self, name: &str, ordinal: usize) -> String {
        match self.placeholder_style() {
            PlaceholderStyle::Named => helpers::placeholder_at(name),
            PlaceholderStyle::Numbered => helpers::placeholder_dollar(ordinal),
            PlaceholderStyle::Anonymous => "?".into(),
        }
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    fn paging_style(&self) -> PagingStyle {
        PagingStyle::LimitOffset
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::Limit
    }

    /// Emit LIMIT/OFFSET or equivalent pagination clause.
    ///
    /// - PostgreSQL/DuckDB/SQLite/MySQL: `LIMIT n OFFSET m` (default)
    /// - T-SQL/SqlCe: `OFFSET m ROWS FETCH NEXT n ROWS ONLY` (override)
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    /// Emit the first-N-rows construct for [`LimitStyle::Top`] dialects.
    fn emit_top(&self, limit: u64) -> TokenStream {
        helpers::emit_top(limit)
    }

    // =========================================================================
    // Row Locking
    // =========================================================================

    fn row_lock_style(&self) -> RowLockStyle {
        RowLockStyle::Unsupported
    }

    fn supports_skip_locked(&self) -> bool {
        false
    }

    /// Emit the lock syntax for this dialect's [`RowLockStyle`].
    fn emit_row_lock(&self, skip_locked: bool) -> TokenStream {
        match self.row_lock_style() {
            RowLockStyle::TableHint => helpers::emit_lock_hint_tsql(skip_locked),
            RowLockStyle::ForUpdate => helpers::emit_for_update(skip_locked),
            RowLockStyle::Unsupported => TokenStream::new(),
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Whether several statements can be sent as one `;`-separated batch.
    fn supports_compound_statements(&self) -> bool {
        true
    }

    /// Function returning the last generated identity value.
    fn identity_function(&self) -> Option<&'static str> {
        None
    }

    fn supports_stored_procedures(&self) -> bool {
        false
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    TSql,
    SqlServer2005,
    SqlCe,
    Postgres,
    MySql,
    DuckDb,
    Sqlite,
}

impl Dialect {
    pub const ALL: [Dialect; 7] = [
        Dialect::TSql,
        Dialect::SqlServer2005,
        Dialect::SqlCe,
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::DuckDb,
        Dialect::Sqlite,
    ];

    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::TSql => &TSql,
            Dialect::SqlServer2005 => &SqlServer2005,
            Dialect::SqlCe => &SqlCe,
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::DuckDb => &DuckDb,
            Dialect::Sqlite => &Sqlite,
        }
    }

    /// `SELECT <identity function>`, when the dialect has one.
    pub fn identity_query(&self) -> Option<String> {
        self.identity_function().map(|f| format!("SELECT {}", f))
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        self.dialect().placeholder_style()
    }

    fn placeholder(&self, name: &str, ordinal: usize) -> String {
        self.dialect().placeholder(name, ordinal)
    }

    fn paging_style(&self) -> PagingStyle {
        self.dialect().paging_style()
    }

    fn limit_style(&self) -> LimitStyle {
        self.dialect().limit_style()
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn emit_top(&self, limit: u64) -> TokenStream {
        self.dialect().emit_top(limit)
    }

    fn row_lock_style(&self) -> RowLockStyle {
        self.dialect().row_lock_style()
    }

    fn supports_skip_locked(&self) -> bool {
        self.dialect().supports_skip_locked()
    }

    fn emit_row_lock(&self, skip_locked: bool) -> TokenStream {
        self.dialect().emit_row_lock(skip_locked)
    }

    fn supports_compound_statements(&self) -> bool {
        self.dialect().supports_compound_statements()
    }

    fn identity_function(&self) -> Option<&'static str> {
        self.dialect().identity_function()
    }

    fn supports_stored_procedures(&self) -> bool {
        self.dialect().supports_stored_procedures()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Dialect::ALL
            .into_iter()
            .find(|d| d.name() == lower)
            .or(match lower.as_str() {
                "mssql" | "sqlserver" => Some(Dialect::TSql),
                "postgresql" | "pg" => Some(Dialect::Postgres),
                _ => None,
            })
            .ok_or_else(|| format!("unknown dialect '{}'", s))
    }
}
