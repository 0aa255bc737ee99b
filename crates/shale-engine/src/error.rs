//! Error types for the database engine.

use shale_core::{ParseError, RowError, SchemaError, TypeError};

/// Errors surfaced at the `execute` boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The statement did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A value failed type validation or coercion.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// A catalog or table-definition failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A NOT NULL column received no value.
    #[error("column '{0}' cannot be NULL")]
    NotNull(String),

    /// A duplicate value reached a UNIQUE column.
    #[error("duplicate value '{value}' for unique column '{column}'")]
    UniqueViolation {
        /// The constrained column.
        column: String,
        /// The duplicated value, rendered as text.
        value: String,
    },

    /// A unique index refused a second row id under an existing key.
    #[error("duplicate key '{key}' in unique index '{name}'")]
    UniqueIndex {
        /// Index name.
        name: String,
        /// The duplicated key, rendered as text.
        key: String,
    },

    /// An index already covers this table/column pair.
    #[error("index already exists on {table}.{column}")]
    DuplicateIndex {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A statement-evaluation failure (mismatched counts, bad operands, ...).
    #[error("execution error: {0}")]
    Execution(String),

    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state failed to encode or decode.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RowError> for EngineError {
    fn from(err: RowError) -> Self {
        match err {
            RowError::NotNull(column) => Self::NotNull(column),
            RowError::Type(err) => Self::Type(err),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
