//! Error types for schema declarations and value parsing

use crate::field::{FieldKind, ValueType};
use thiserror::Error;

/// Schema error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Schema '{schema}' already declares a field named '{field}'")]
    DuplicateField { schema: String, field: String },

    #[error("Schema name must not be empty")]
    EmptySchemaName,

    #[error("Field name must not be empty (schema '{0}')")]
    EmptyFieldName(String),

    #[error("Field '{field}' expects {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: ValueType,
        got: ValueType,
    },

    #[error("Cannot pair {left} with {right}: operand must be a String and a Blob field")]
    InvalidOperand { left: FieldKind, right: FieldKind },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SchemaError>;
