//! Error types for the row and batch model.

use thiserror::Error;

/// Errors raised while building schemas and batches.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A header lists the same column twice.
    #[error("duplicate column '{column}' in schema")]
    DuplicateColumn { column: String },

    /// A row does not have one value per schema column.
    #[error("row has {found} values, schema has {expected} columns")]
    RowWidth { expected: usize, found: usize },
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
