//! Recoverable schema mismatches.

use serde::{Deserialize, Serialize};

/// A configured column was absent from a batch, so one transform skipped it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaWarning {
    /// Transform that skipped the column.
    pub stage: String,
    pub column: String,
    /// Index of the batch within its source.
    pub batch: usize,
}

impl SchemaWarning {
    pub fn new(stage: &str, column: &str, batch: usize) -> Self {
        // A file's schema is fixed, so later batches repeat the first warning.
        if batch == 0 {
            tracing::warn!(
                stage = %stage,
                column = %column,
                "Configured column not present in batch; skipping"
            );
        } else {
            tracing::debug!(stage = %stage, column = %column, batch, "Column still missing");
        }
        Self {
            stage: stage.to_string(),
            column: column.to_string(),
            batch,
        }
    }
}

impl std::fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: column '{}' missing from batch {}",
            self.stage, self.column, self.batch
        )
    }
}
