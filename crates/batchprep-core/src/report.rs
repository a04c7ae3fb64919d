//! Run and per-unit reports.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use batchprep_ingest::LoadCompleteness;
use batchprep_transform::{ColumnStatistics, SchemaWarning, StatisticsScope};

use crate::config::DedupeSetting;

/// Rule name under which deduplication drops are counted.
pub const DEDUPE_RULE: &str = "dedupe";

/// Outcome of loading one reference table.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceSummary {
    pub path: PathBuf,
    pub key_column: String,
    /// Distinct keys in the index.
    pub keys: usize,
    pub completeness: LoadCompleteness,
    /// Requested value columns absent from the reference file.
    pub missing_columns: Vec<String>,
}

/// Counters for one processing unit (one input file).
#[derive(Debug, Clone, Default, Serialize)]
pub struct UnitReport {
    pub input: PathBuf,
    /// Files written for this unit.
    pub outputs: Vec<PathBuf>,
    pub mapping_table: Option<PathBuf>,
    /// Batches fully processed and written.
    pub batches: usize,
    pub rows_read: u64,
    pub rows_written: u64,
    /// Dropped rows per named rule.
    pub dropped: BTreeMap<String, u64>,
    /// Columns removed by drop steps.
    pub columns_dropped: Vec<String>,
    pub filled: BTreeMap<String, u64>,
    pub imputed: BTreeMap<String, u64>,
    /// Distinct values coded per encoded column.
    pub encoded_values: BTreeMap<String, usize>,
    pub enrich_matched: u64,
    pub enrich_unmatched: u64,
    /// Statistics from the first pass, when one ran.
    pub statistics: Option<ColumnStatistics>,
    /// First occurrence of each skipped (stage, column) pair.
    pub warnings: Vec<SchemaWarning>,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl UnitReport {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    pub fn rows_dropped(&self) -> u64 {
        self.dropped.values().sum()
    }

    /// Every row read was either written or dropped by a named rule.
    pub fn is_conserved(&self) -> bool {
        self.rows_read == self.rows_written + self.rows_dropped()
    }

    pub(crate) fn record_drop(&mut self, rule: &str, count: usize) {
        if count > 0 {
            *self.dropped.entry(rule.to_string()).or_insert(0) += count as u64;
        }
    }

    pub(crate) fn record_warnings(&mut self, warnings: Vec<SchemaWarning>) {
        for warning in warnings {
            let seen = self
                .warnings
                .iter()
                .any(|w| w.stage == warning.stage && w.column == warning.column);
            if !seen {
                self.warnings.push(warning);
            }
        }
    }
}

/// Adds per-column counts into a running total.
pub(crate) fn add_counts(target: &mut BTreeMap<String, u64>, counts: BTreeMap<String, usize>) {
    for (column, count) in counts {
        *target.entry(column).or_insert(0) += count as u64;
    }
}

/// Report for a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub statistics_scope: StatisticsScope,
    pub dedupe: DedupeSetting,
    pub references: Vec<ReferenceSummary>,
    pub units: Vec<UnitReport>,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn new(statistics_scope: StatisticsScope, dedupe: DedupeSetting) -> Self {
        Self {
            started_at: Utc::now(),
            statistics_scope,
            dedupe,
            references: Vec::new(),
            units: Vec::new(),
            cancelled: false,
            elapsed_ms: 0,
        }
    }

    pub fn batches(&self) -> usize {
        self.units.iter().map(|u| u.batches).sum()
    }

    pub fn rows_read(&self) -> u64 {
        self.units.iter().map(|u| u.rows_read).sum()
    }

    pub fn rows_written(&self) -> u64 {
        self.units.iter().map(|u| u.rows_written).sum()
    }

    pub fn rows_dropped(&self) -> u64 {
        self.units.iter().map(UnitReport::rows_dropped).sum()
    }

    /// Drops per rule across all units.
    pub fn dropped_by_rule(&self) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for unit in &self.units {
            for (rule, count) in &unit.dropped {
                *totals.entry(rule.clone()).or_insert(0) += count;
            }
        }
        totals
    }

    pub fn warning_count(&self) -> usize {
        self.units.iter().map(|u| u.warnings.len()).sum()
    }

    pub fn is_conserved(&self) -> bool {
        self.units.iter().all(UnitReport::is_conserved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conservation() {
        let mut unit = UnitReport::new(PathBuf::from("a.csv"));
        unit.rows_read = 10;
        unit.rows_written = 7;
        unit.record_drop(DEDUPE_RULE, 2);
        assert!(!unit.is_conserved());
        unit.record_drop("filter:Unknown", 1);
        assert!(unit.is_conserved());
        unit.record_drop("filter:Unknown", 0);
        assert_eq!(unit.dropped.len(), 2);
    }

    #[test]
    fn test_warnings_recorded_once_per_column() {
        let mut unit = UnitReport::default();
        unit.record_warnings(vec![SchemaWarning::new("encode", "county", 0)]);
        unit.record_warnings(vec![
            SchemaWarning::new("encode", "county", 1),
            SchemaWarning::new("impute", "county", 1),
        ]);
        assert_eq!(unit.warnings.len(), 2);
        assert_eq!(unit.warnings[0].batch, 0);
    }

    #[test]
    fn test_run_totals() {
        let mut report = RunReport::new(StatisticsScope::Global, DedupeSetting::Batch);
        for (read, written) in [(5, 4), (3, 3)] {
            let mut unit = UnitReport::default();
            unit.rows_read = read;
            unit.rows_written = written;
            unit.record_drop(DEDUPE_RULE, (read - written) as usize);
            report.units.push(unit);
        }
        assert_eq!(report.rows_read(), 8);
        assert_eq!(report.rows_dropped(), 1);
        assert_eq!(report.dropped_by_rule()[DEDUPE_RULE], 1);
        assert!(report.is_conserved());
    }
}
