//! Crate-wide error type.
//!
//! Every failure carries the offending name or clause. Nothing here ever
//! degrades into a best-guess SQL fragment.

use thiserror::Error;

use crate::execution::ExecutionError;
use crate::schema::ProviderError;

/// Result type for dynaquery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building, resolving, compiling or running a query.
#[derive(Error, Debug)]
pub enum Error {
    /// A name could not be mapped to exactly one schema object.
    #[error("unresolvable reference '{name}': {reason}")]
    UnresolvableReference {
        /// The name (or dotted path) as the caller wrote it.
        name: String,
        /// Why resolution failed (not found, ambiguous, no foreign key...).
        reason: String,
    },

    /// The query cannot be built or compiled in its current shape.
    #[error("invalid query state in {clause}: {message}")]
    InvalidQueryState {
        /// Clause that triggered the failure (e.g. "ThenBy").
        clause: String,
        message: String,
    },

    /// The target dialect lacks a feature the query asks for.
    #[error("{feature} is not supported by the {dialect} dialect")]
    UnsupportedFeature {
        dialect: String,
        feature: String,
    },

    /// The schema provider failed; the cached schema (if any) is unchanged.
    #[error("schema unavailable: {0}")]
    SchemaUnavailable(#[source] ProviderError),

    /// The execution sink reported a backend error.
    #[error("execution failed: {0}")]
    Execution(#[source] ExecutionError),
}

impl Error {
    /// Create an unresolvable-reference error.
    pub fn unresolvable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvableReference {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-query-state error.
    pub fn invalid_state(clause: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidQueryState {
            clause: clause.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported-feature error.
    pub fn unsupported(dialect: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            dialect: dialect.into(),
            feature: feature.into(),
        }
    }

    pub fn is_unresolvable(&self) -> bool {
        matches!(self, Self::UnresolvableReference { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidQueryState { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedFeature { .. })
    }

    pub fn is_schema_unavailable(&self) -> bool {
        matches!(self, Self::SchemaUnavailable(_))
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        Self::SchemaUnavailable(err)
    }
}

impl From<ExecutionError> for Error {
    fn from(err: ExecutionError) -> Self {
        Self::Execution(err)
    }
}
