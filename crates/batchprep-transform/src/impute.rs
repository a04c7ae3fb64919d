//! Sentinel replacement from precomputed statistics.

use std::collections::BTreeMap;

use batchprep_model::Batch;

use crate::statistics::{ColumnStatistics, ImputeColumn};
use crate::warning::SchemaWarning;

/// Replaces sentinel cells of configured columns with their statistic.
///
/// Holds no state between batches: output depends only on the batch and the
/// statistics passed in.
#[derive(Debug, Clone, Default)]
pub struct Imputer {
    columns: Vec<ImputeColumn>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImputeOutcome {
    /// Cells replaced, per column.
    pub imputed: BTreeMap<String, usize>,
    pub warnings: Vec<SchemaWarning>,
}

impl Imputer {
    pub const STAGE: &'static str = "impute";

    pub fn new(columns: Vec<ImputeColumn>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ImputeColumn] {
        &self.columns
    }

    pub fn apply(&self, batch: &mut Batch, statistics: &ColumnStatistics) -> ImputeOutcome {
        let mut outcome = ImputeOutcome::default();
        for column in &self.columns {
            let Some(position) = batch.schema().position(&column.column) else {
                outcome
                    .warnings
                    .push(SchemaWarning::new(Self::STAGE, &column.column, batch.index));
                continue;
            };
            let Some(statistic) = statistics.get(&column.column) else {
                if batch.index == 0 {
                    tracing::warn!(
                        column = %column.column,
                        "No statistic for column; leaving values unchanged"
                    );
                } else {
                    tracing::debug!(column = %column.column, batch = batch.index, "No statistic");
                }
                continue;
            };

            let fill = statistic.fill_value();
            let mut replaced = 0;
            for row in batch.rows_mut() {
                if let Some(cell) = row.get_mut(position)
                    && column.sentinel.matches(cell)
                {
                    *cell = fill.clone();
                    replaced += 1;
                }
            }
            if replaced > 0 {
                *outcome.imputed.entry(column.column.clone()).or_insert(0) += replaced;
            }
        }
        outcome
    }
}
