//! DuckDB SQL dialect.
//!
//! DuckDB is an embedded analytical database: ANSI quoting, `$n`
//! parameters and LIMIT/OFFSET paging. It has no row locks and no
//! identity retrieval function (sequences are used instead).

use super::helpers;
use super::SqlDialect;

/// DuckDB SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }
}
