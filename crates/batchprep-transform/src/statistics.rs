//! Fill statistics for imputation.
//!
//! A [`StatisticsAccumulator`] observes batches and produces one
//! [`ColumnStatistic`] per configured column:
//!
//! - **Mode**: running frequency per distinct non-sentinel value; ties go to
//!   the value seen first.
//! - **Median**: exact, from a value-to-count histogram of the non-sentinel
//!   numeric values. Memory grows with distinct values, not rows. With an
//!   even count the two middle values are averaged.
//!
//! Under [`StatisticsScope::Global`] the accumulator runs as a read-only
//! first pass over the whole processing unit. Under
//! [`StatisticsScope::PerBatch`] each batch gets its own statistics via
//! [`StatisticsAccumulator::from_batch`] right before it is imputed.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use batchprep_model::{Batch, ColumnStatistic, Sentinel};

use crate::warning::SchemaWarning;

/// Statistics keyed by column name.
pub type ColumnStatistics = BTreeMap<String, ColumnStatistic>;

/// Which rows a statistic is computed from. Fixed for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsScope {
    /// Every batch of the processing unit, in a dedicated first pass.
    #[default]
    Global,
    /// Only the batch being imputed. Output depends on batch capacity.
    PerBatch,
}

impl std::fmt::Display for StatisticsScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::PerBatch => f.write_str("per_batch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    Mode,
    Median,
}

fn default_sentinel() -> Sentinel {
    Sentinel::Missing
}

/// One column subject to imputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputeColumn {
    pub column: String,
    pub strategy: ImputeStrategy,
    /// Value treated as missing; the empty cell when not configured.
    #[serde(default = "default_sentinel")]
    pub sentinel: Sentinel,
}

impl ImputeColumn {
    pub fn mode(column: impl Into<String>, sentinel: Sentinel) -> Self {
        Self {
            column: column.into(),
            strategy: ImputeStrategy::Mode,
            sentinel,
        }
    }

    pub fn median(column: impl Into<String>, sentinel: Sentinel) -> Self {
        Self {
            column: column.into(),
            strategy: ImputeStrategy::Median,
            sentinel,
        }
    }
}

/// `f64` ordered by [`f64::total_cmp`], usable as a map key.
#[derive(Debug, Clone, Copy)]
struct OrderedF64(f64);

impl PartialEq for OrderedF64 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedF64 {}

impl PartialOrd for OrderedF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Default)]
struct FrequencyTracker {
    /// value -> (count, first-seen rank)
    counts: HashMap<String, (u64, usize)>,
}

impl FrequencyTracker {
    fn observe(&mut self, value: &str) {
        let rank = self.counts.len();
        self.counts
            .entry(value.to_string())
            .or_insert((0, rank))
            .0 += 1;
    }

    fn mode(&self) -> Option<String> {
        self.counts
            .iter()
            .max_by(|(_, (count_a, rank_a)), (_, (count_b, rank_b))| {
                count_a.cmp(count_b).then(rank_b.cmp(rank_a))
            })
            .map(|(value, _)| value.clone())
    }
}

#[derive(Debug, Default)]
struct MedianHistogram {
    counts: BTreeMap<OrderedF64, u64>,
    total: u64,
    unparseable: u64,
}

impl MedianHistogram {
    fn observe(&mut self, value: f64) {
        // -0 and 0 are the same observation.
        let value = if value == 0.0 { 0.0 } else { value };
        *self.counts.entry(OrderedF64(value)).or_insert(0) += 1;
        self.total += 1;
    }

    /// Value at zero-based sorted position `rank`.
    fn nth(&self, rank: u64) -> Option<f64> {
        let mut seen = 0;
        for (value, count) in &self.counts {
            seen += count;
            if rank < seen {
                return Some(value.0);
            }
        }
        None
    }

    fn median(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let upper = self.nth(self.total / 2)?;
        if self.total % 2 == 1 {
            return Some(upper);
        }
        let lower = self.nth(self.total / 2 - 1)?;
        Some((lower + upper) / 2.0)
    }
}

#[derive(Debug)]
enum Tracker {
    Frequency(FrequencyTracker),
    Histogram(MedianHistogram),
}

#[derive(Debug)]
struct ColumnTracker {
    target: ImputeColumn,
    tracker: Tracker,
}

/// Accumulates per-column statistics across batches.
#[derive(Debug)]
pub struct StatisticsAccumulator {
    columns: Vec<ColumnTracker>,
    batches: usize,
}

impl StatisticsAccumulator {
    pub const STAGE: &'static str = "statistics";

    pub fn new(columns: &[ImputeColumn]) -> Self {
        let columns = columns
            .iter()
            .map(|target| ColumnTracker {
                target: target.clone(),
                tracker: match target.strategy {
                    ImputeStrategy::Mode => Tracker::Frequency(FrequencyTracker::default()),
                    ImputeStrategy::Median => Tracker::Histogram(MedianHistogram::default()),
                },
            })
            .collect();
        Self {
            columns,
            batches: 0,
        }
    }

    /// Statistics of a single batch, for per-batch imputation.
    pub fn from_batch(
        columns: &[ImputeColumn],
        batch: &Batch,
    ) -> (ColumnStatistics, Vec<SchemaWarning>) {
        let mut accumulator = Self::new(columns);
        let warnings = accumulator.observe(batch);
        (accumulator.finalize(), warnings)
    }

    /// Number of batches observed so far.
    pub fn batches_observed(&self) -> usize {
        self.batches
    }

    /// Folds one batch into the running statistics. Read-only on the batch.
    pub fn observe(&mut self, batch: &Batch) -> Vec<SchemaWarning> {
        self.batches += 1;
        let mut warnings = Vec::new();
        for column in &mut self.columns {
            let Some(position) = batch.schema().position(&column.target.column) else {
                warnings.push(SchemaWarning::new(
                    Self::STAGE,
                    &column.target.column,
                    batch.index,
                ));
                continue;
            };
            let sentinel = &column.target.sentinel;
            let observed = batch
                .rows()
                .iter()
                .filter_map(|row| row.get(position))
                .filter(|value| !value.is_missing() && !sentinel.matches(value));
            match &mut column.tracker {
                Tracker::Frequency(frequency) => {
                    for value in observed {
                        frequency.observe(&value.render());
                    }
                }
                Tracker::Histogram(histogram) => {
                    for value in observed {
                        match value.as_f64() {
                            Some(number) => histogram.observe(number),
                            None => histogram.unparseable += 1,
                        }
                    }
                }
            }
        }
        warnings
    }

    /// Final statistics. Columns with no usable observation are absent.
    pub fn finalize(self) -> ColumnStatistics {
        let mut statistics = ColumnStatistics::new();
        for ColumnTracker { target, tracker } in self.columns {
            let statistic = match tracker {
                Tracker::Frequency(frequency) => frequency.mode().map(ColumnStatistic::Mode),
                Tracker::Histogram(histogram) => {
                    if histogram.unparseable > 0 {
                        tracing::warn!(
                            column = %target.column,
                            skipped = histogram.unparseable,
                            "Skipped non-numeric values while computing median"
                        );
                    }
                    histogram.median().map(ColumnStatistic::Median)
                }
            };
            match statistic {
                Some(statistic) => {
                    tracing::debug!(column = %target.column, "Computed statistic");
                    statistics.insert(target.column, statistic);
                }
                None => {
                    tracing::debug!(column = %target.column, "No observations for statistic");
                }
            }
        }
        statistics
    }
}
