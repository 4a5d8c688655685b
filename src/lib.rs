//! # dynaquery
//!
//! Dynamic, schema-aware SQL query building for multiple dialects.
//!
//! ## Architecture
//!
//! Queries are written against names as the caller thinks of them
//! ("User", "users", "Orders.Customer.Name") and bound to the real schema
//! only at compile time:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Query (immutable builder)                │
//! │   ObjectReference, SimpleExpression, clause list         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [schema cache]
//! ┌─────────────────────────────────────────────────────────┐
//! │        DatabaseSchema (tables, columns, foreign keys)    │
//! │        + tiered fuzzy name resolution                    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compiler + pager]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Statement (SQL text + named parameters)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [execution sink]
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Rows                                 │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use dynaquery::prelude::*;
//!
//! let users = ObjectReference::new("Users");
//! let query = Query::table("users")
//!     .filter(users.field("Age").greater_than(30))
//!     .order_by(users.field("Name"))
//!     .skip(10)
//!     .take(10);
//!
//! let compiled = Compiler::new(&schema, Dialect::Postgres).compile(&query)?;
//! println!("{}", compiled.statement.sql);
//! ```

pub mod adapters;
pub mod compiler;
pub mod config;
pub mod error;
pub mod execution;
pub mod model;
pub mod schema;
pub mod sql;

pub use compiler::{
    CompiledQuery, Compiler, CompilerOptions, DetailCollection, OrderFallback, Parameter, Statement,
};
pub use error::{Error, Result};
pub use execution::{Database, ExecutionSink, QueryResult, Row};
pub use model::{Comparable, ObjectReference, Query, SimpleExpression, TotalCount, Value};
pub use schema::{DatabaseSchema, NamingPolicy, SchemaCache, SchemaProvider};
pub use sql::Dialect;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compiler::{
        CompiledQuery, Compiler, CompilerOptions, DetailCollection, OrderFallback, Statement,
    };
    pub use crate::error::{Error, Result};
    pub use crate::execution::{Database, ExecutionSink, QueryResult, Row};
    pub use crate::model::{
        Aggregate, Comparable, ExpressionType, FunctionReference, JoinKind, ObjectReference,
        Projection, Query, SimpleExpression, TotalCount, Value,
    };
    pub use crate::schema::{
        DatabaseSchema, NamingPolicy, SchemaCache, SchemaProvider, StaticProvider,
    };
    pub use crate::sql::{Dialect, SqlDialect};
}
