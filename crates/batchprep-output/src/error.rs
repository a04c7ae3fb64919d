//! Error types for output sinks.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while writing output.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Filesystem failure on a destination.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// CSV serialization or parsing failure.
    #[error("CSV error in {path}: {message}")]
    Csv { path: PathBuf, message: String },

    /// The fan-out partition column is not in the batch schema.
    #[error("partition column '{column}' not found in schema")]
    PartitionColumnMissing { column: String },

    /// A batch's columns differ from those already written to the destination.
    #[error("schema of {path} changed: expected [{}], found [{}]", .expected.join(", "), .found.join(", "))]
    SchemaChanged {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A mapping table file is malformed.
    #[error("invalid mapping table {path}: {reason}")]
    InvalidMapping { path: PathBuf, reason: String },
}

impl OutputError {
    pub(crate) fn io(path: &std::path::Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &std::path::Path, error: &csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }
}

/// Result type for output operations.
pub type Result<T> = std::result::Result<T, OutputError>;
