//! Error types for batch transforms.

use thiserror::Error;

/// Errors raised by transforms.
///
/// Absent columns are not errors here: transforms skip the affected column
/// for that batch and report a [`crate::SchemaWarning`] instead.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Reference rows do not carry the join key column.
    #[error("reference table has no key column '{column}'")]
    ReferenceLoad { column: String },

    /// An encoding mapping table is inconsistent.
    #[error("invalid encoding mapping: {reason}")]
    InvalidMapping { reason: String },
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;
