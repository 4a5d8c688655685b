//! Test utilities for SQL emission validation.
//!
//! Provides helpers for validating that emitted SQL is syntactically correct
//! using sqlparser-rs for roundtrip validation.

use sqlparser::dialect::{
    DuckDbDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect,
};
use sqlparser::parser::Parser;

use super::dialect::Dialect;

/// Validates that a SQL string is syntactically valid for the given dialect.
///
/// Placeholders are replaced by literals first: sqlparser's dialects differ
/// in which placeholder forms they accept, and only the structure matters here.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::TSql | Dialect::SqlServer2005 | Dialect::SqlCe => Box::new(MsSqlDialect {}),
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
    };

    let sql = strip_placeholders(sql);
    Parser::parse_sql(&*parser_dialect, &sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL for {:?}: {}\nSQL: {}", dialect, e, sql))
}

/// Replace `@name`, `$n` and `?` placeholders with `0`.
fn strip_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '@' if chars.peek().is_some_and(|n| n.is_alphanumeric() || *n == '_') => {
                while chars.peek().is_some_and(|n| n.is_alphanumeric() || *n == '_') {
                    chars.next();
                }
                out.push('0');
            }
            '$' if chars.peek().is_some_and(|n| n.is_ascii_digit()) => {
                while chars.peek().is_some_and(|n| n.is_ascii_digit()) {
                    chars.next();
                }
                out.push('0');
            }
            '?' => out.push('0'),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        validate_sql("SELECT * FROM users", Dialect::Postgres).unwrap();
        validate_sql("SELECT * FROM users WHERE id = ?", Dialect::MySql).unwrap();
        validate_sql("SELECT * FROM [users] WHERE [id] = @p1", Dialect::TSql).unwrap();
    }

    #[test]
    fn test_validate_invalid_sql() {
        let result = validate_sql("SELEC * FORM users", Dialect::Postgres);
        assert!(result.is_err());
    }

    #[test]
    fn test_strip_placeholders() {
        assert_eq!(strip_placeholders("a = @p1_0 AND b = $2"), "a = 0 AND b = 0");
    }
}
