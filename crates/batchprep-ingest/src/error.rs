//! Error types for batch ingestion.

use std::path::PathBuf;
use thiserror::Error;

use batchprep_model::ModelError;

/// Errors that can occur while reading source and reference tables.
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// CSV file not found.
    #[error("CSV file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Input could not be opened or read.
    #[error("failed to read {path}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === CSV Parsing Errors ===
    /// File is empty or its first line holds no column names.
    #[error("no header row found in {path}")]
    MissingHeader { path: PathBuf },

    /// Header row could not be turned into a schema.
    #[error("invalid header in {path}: {source}")]
    InvalidSchema {
        path: PathBuf,
        #[source]
        source: ModelError,
    },

    /// Malformed CSV record.
    #[error("failed to parse CSV {path}{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Csv {
        path: PathBuf,
        line: Option<u64>,
        message: String,
    },

    // === Reference Table Errors ===
    /// Reference table has no column with the join key name.
    #[error("key column '{column}' not found in reference table {path}")]
    MissingKeyColumn { column: String, path: PathBuf },

    /// Reference table could not be loaded by any strategy.
    #[error("failed to load reference table {path}: {reason}")]
    ReferenceLoad { path: PathBuf, reason: String },

    // === DataFrame Errors ===
    /// Failed DataFrame operation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },

    /// Reader options are unusable.
    #[error("invalid ingest options: {reason}")]
    InvalidOptions { reason: String },
}

impl IngestError {
    /// Classifies a `csv` error, keeping I/O failures distinct from parse failures.
    pub(crate) fn from_csv(path: &std::path::Path, err: csv::Error) -> Self {
        let line = err.position().map(csv::Position::line);
        let message = err.to_string();
        if err.is_io_error()
            && let csv::ErrorKind::Io(source) = err.into_kind()
        {
            return Self::SourceRead {
                path: path.to_path_buf(),
                source,
            };
        }
        Self::Csv {
            path: path.to_path_buf(),
            line,
            message,
        }
    }

    pub(crate) fn from_open(path: &std::path::Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::SourceRead {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

impl From<polars::prelude::PolarsError> for IngestError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
