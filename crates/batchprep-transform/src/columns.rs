//! Column removal.

use batchprep_model::Batch;

/// Removes listed columns; names absent from a batch are ignored.
#[derive(Debug, Clone, Default)]
pub struct ColumnDropper {
    columns: Vec<String>,
}

impl ColumnDropper {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Drops the columns in place and returns the names that were present.
    pub fn apply(&self, batch: &mut Batch) -> Vec<String> {
        batch.drop_columns(&self.columns)
    }
}
