//! Error types for query construction and parameter setting

use crate::clause::ClauseKind;
use thiserror::Error;

/// Query error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Unknown query parameters: {}.", .0.join(", "))]
    UnknownParameters(Vec<String>),

    #[error("Query cannot have more than one {kind}, got {count}.")]
    DuplicateClause { kind: ClauseKind, count: usize },

    #[error("Query does not have mandatory clause: {0}.")]
    MissingClause(ClauseKind),

    #[error("Space '{0}' is not part of the index")]
    UnknownSpace(String),

    #[error("Space '{0}' has more than one weight clause")]
    DuplicateSpaceWeight(String),

    #[error("Schema '{0}' has no id field")]
    MissingIdField(String),

    #[error("Field '{field}' does not belong to schema '{schema}'")]
    ForeignField { field: String, schema: String },

    #[error("Parameter '{name}' should be {expected}, got {got}")]
    InvalidParamValue {
        name: String,
        expected: &'static str,
        got: String,
    },

    #[error("Radius must be between 0 and 1, got {0}")]
    InvalidRadius(f64),

    #[error("Limit must be -1 or a non-negative number, got {0}")]
    InvalidLimit(i64),

    #[error("Natural language query evaluation failed: {0}")]
    Nlq(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, QueryError>;
