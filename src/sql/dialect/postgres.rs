//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Numbered `$n` parameters
//! - `FOR UPDATE [SKIP LOCKED]` row locks
//! - `LASTVAL()` for the last sequence value

use super::helpers;
use super::{RowLockStyle, SqlDialect};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    // Uses default placeholder ($n) and emit_limit_offset (LIMIT ... OFFSET ...)

    fn row_lock_style(&self) -> RowLockStyle {
        RowLockStyle::ForUpdate
    }

    fn supports_skip_locked(&self) -> bool {
        // 9.5+
        true
    }

    fn identity_function(&self) -> Option<&'static str> {
        Some("LASTVAL()")
    }

    fn supports_stored_procedures(&self) -> bool {
        true
    }
}
