//! Named row-drop rules.

use batchprep_model::{Batch, Sentinel};

use crate::warning::SchemaWarning;

/// Drops every row in which any configured column holds the sentinel.
#[derive(Debug, Clone)]
pub struct RowFilter {
    rule: String,
    columns: Vec<String>,
    sentinel: Sentinel,
}

/// Result of filtering one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub dropped: usize,
    pub warnings: Vec<SchemaWarning>,
}

impl RowFilter {
    pub const STAGE: &'static str = "filter_rows";

    /// Filter on `columns`, named `filter:<sentinel>` unless renamed.
    pub fn new(columns: Vec<String>, sentinel: Sentinel) -> Self {
        let rule = match &sentinel {
            Sentinel::Text(text) => format!("filter:{text}"),
            other => format!("filter:{other}"),
        };
        Self {
            rule,
            columns,
            sentinel,
        }
    }

    #[must_use]
    pub fn with_rule_name(mut self, rule: impl Into<String>) -> Self {
        self.rule = rule.into();
        self
    }

    /// Name under which drops are reported.
    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn apply(&self, batch: &mut Batch) -> FilterOutcome {
        let mut warnings = Vec::new();
        let mut positions = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            match batch.schema().position(column) {
                Some(position) => positions.push(position),
                None => warnings.push(SchemaWarning::new(Self::STAGE, column, batch.index)),
            }
        }
        if positions.is_empty() {
            return FilterOutcome {
                dropped: 0,
                warnings,
            };
        }

        let sentinel = &self.sentinel;
        let dropped = batch.retain_rows(|row| {
            !positions
                .iter()
                .any(|&p| row.get(p).is_some_and(|value| sentinel.matches(value)))
        });
        if dropped > 0 {
            tracing::debug!(rule = %self.rule, batch = batch.index, dropped, "Filtered rows");
        }
        FilterOutcome { dropped, warnings }
    }
}
