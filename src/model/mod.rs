//! Query model: references, expressions, clauses and the query builder.
//!
//! Everything in this module is an immutable value. Nothing here touches the
//! schema; binding names to tables and columns happens in [`crate::compiler`].

pub mod clause;
pub mod expr;
pub mod query;
pub mod reference;
pub mod value;

pub use clause::{
    Clause, ClauseKind, ClauseList, JoinClause, JoinKind, OrderByClause, OrderDirection,
    TotalCount,
};
pub use expr::{Comparable, ExpressionType, Operand, Rhs, SimpleExpression};
pub use query::Query;
pub use reference::{Aggregate, FunctionReference, ObjectReference, Projection};
pub use value::Value;
