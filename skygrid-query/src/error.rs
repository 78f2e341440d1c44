//! Error types for query parsing and evaluation.

use thiserror::Error;

/// Query errors. All of these are client errors: a malformed spec is
/// rejected, never a process failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The filter spec could not be parsed into a predicate tree.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// A filter or aggregation references a field the schema does not declare.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// The aggregation spec is malformed.
    #[error("Invalid aggregation: {0}")]
    InvalidAggregation(String),
}

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
