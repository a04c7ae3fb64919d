//! Error types for pipeline runs.

use std::path::PathBuf;

use thiserror::Error;

use batchprep_ingest::IngestError;
use batchprep_output::OutputError;
use batchprep_transform::TransformError;

/// Fatal pipeline errors. Recoverable schema mismatches are reported as
/// warnings in the run report instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Output(#[from] OutputError),

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is malformed or inconsistent.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// An enrich step has no reference table to join against.
    #[error("enrich step on '{key_column}' has no reference table")]
    MissingReference { key_column: String },

    #[error("no input files given")]
    NoInputs,
}

impl PipelineError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
