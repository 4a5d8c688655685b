//! SQL text generation.
//!
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations and capability flags

pub mod dialect;
pub mod token;

#[cfg(test)]
pub mod test_utils;

pub use dialect::{Dialect, LimitStyle, PagingStyle, PlaceholderStyle, RowLockStyle, SqlDialect};
pub use token::{Token, TokenStream};
