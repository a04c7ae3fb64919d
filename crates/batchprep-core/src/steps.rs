//! Ordered batch steps built from configuration.
//!
//! Steps hold their own cross-batch state (the encoder's maps), so a fresh
//! step list is built for every processing unit and every pass.

use std::sync::Arc;

use batchprep_model::Batch;
use batchprep_transform::{
    CategoricalEncoder, ColumnDropper, ColumnStatistics, Deduplicator, EnrichJoin, Imputer,
    MappingTable, MissingFiller, ReferenceIndex, RowFilter, StatisticsAccumulator,
    StatisticsScope,
};

use crate::config::{PipelineConfig, StepConfig};
use crate::error::{PipelineError, Result};
use crate::report::{DEDUPE_RULE, UnitReport, add_counts};

/// One executable transform.
#[derive(Debug)]
pub(crate) enum PipelineStep {
    DropColumns(ColumnDropper),
    FillMissing(MissingFiller),
    FilterRows(RowFilter),
    Impute(Imputer),
    Encode {
        encoder: CategoricalEncoder,
        write_mapping: bool,
    },
    Enrich(EnrichJoin),
}

/// Inputs shared by every step of one batch.
pub(crate) struct StepContext<'a> {
    pub scope: StatisticsScope,
    /// Precomputed statistics under [`StatisticsScope::Global`].
    pub statistics: Option<&'a ColumnStatistics>,
}

impl PipelineStep {
    pub fn step_name(&self) -> &'static str {
        match self {
            Self::DropColumns(_) => "drop_columns",
            Self::FillMissing(_) => "fill_missing",
            Self::FilterRows(_) => "filter_rows",
            Self::Impute(_) => Imputer::STAGE,
            Self::Encode { .. } => CategoricalEncoder::STAGE,
            Self::Enrich(_) => EnrichJoin::STAGE,
        }
    }

    /// Runs the step on `batch`, folding its counters into `report`.
    pub fn execute(&mut self, batch: &mut Batch, ctx: &StepContext<'_>, report: &mut UnitReport) {
        match self {
            Self::DropColumns(dropper) => {
                for column in dropper.apply(batch) {
                    if !report.columns_dropped.contains(&column) {
                        report.columns_dropped.push(column);
                    }
                }
            }
            Self::FillMissing(filler) => {
                add_counts(&mut report.filled, filler.fill(batch));
            }
            Self::FilterRows(filter) => {
                let outcome = filter.apply(batch);
                report.record_drop(filter.rule(), outcome.dropped);
                report.record_warnings(outcome.warnings);
            }
            Self::Impute(imputer) => {
                let outcome = match (ctx.scope, ctx.statistics) {
                    (StatisticsScope::Global, Some(statistics)) => imputer.apply(batch, statistics),
                    (StatisticsScope::Global, None) => {
                        imputer.apply(batch, &ColumnStatistics::new())
                    }
                    (StatisticsScope::PerBatch, _) => {
                        let (statistics, warnings) =
                            StatisticsAccumulator::from_batch(imputer.columns(), batch);
                        report.record_warnings(warnings);
                        imputer.apply(batch, &statistics)
                    }
                };
                add_counts(&mut report.imputed, outcome.imputed);
                report.record_warnings(outcome.warnings);
            }
            Self::Encode { encoder, .. } => {
                let outcome = encoder.encode(batch);
                report.record_warnings(outcome.warnings);
                report.encoded_values = encoder.distinct_counts();
            }
            Self::Enrich(join) => {
                let outcome = join.apply(batch);
                report.enrich_matched += outcome.matched as u64;
                report.enrich_unmatched += outcome.unmatched as u64;
                report.record_warnings(outcome.warnings);
            }
        }
    }

    /// Mapping table to export, for an encode step that writes one.
    pub fn mapping_table(&self) -> Option<MappingTable> {
        match self {
            Self::Encode {
                encoder,
                write_mapping: true,
            } => Some(encoder.mapping_table()),
            _ => None,
        }
    }
}

/// Builds steps `0..end` of `config`.
///
/// `references` holds one index per step; enrich steps must have theirs.
pub(crate) fn build_steps(
    config: &PipelineConfig,
    references: &[Option<Arc<ReferenceIndex>>],
    end: usize,
) -> Result<Vec<PipelineStep>> {
    config
        .steps
        .iter()
        .take(end)
        .enumerate()
        .map(|(index, step)| build_step(step, references.get(index).cloned().flatten()))
        .collect()
}

fn build_step(step: &StepConfig, reference: Option<Arc<ReferenceIndex>>) -> Result<PipelineStep> {
    Ok(match step {
        StepConfig::DropColumns { columns } => {
            PipelineStep::DropColumns(ColumnDropper::new(columns.clone()))
        }
        StepConfig::FillMissing {
            fill,
            columns,
            exclude,
        } => PipelineStep::FillMissing(
            MissingFiller::new(fill.clone())
                .with_columns(columns.clone())
                .with_excluded(exclude.clone()),
        ),
        StepConfig::FilterRows {
            columns,
            sentinel,
            name,
        } => {
            let filter = RowFilter::new(columns.clone(), sentinel.clone());
            PipelineStep::FilterRows(match name {
                Some(name) => filter.with_rule_name(name.clone()),
                None => filter,
            })
        }
        StepConfig::Impute { columns } => PipelineStep::Impute(Imputer::new(columns.clone())),
        StepConfig::Encode {
            columns,
            sentinel,
            token,
            write_mapping,
        } => PipelineStep::Encode {
            encoder: CategoricalEncoder::new(columns.clone())
                .with_sentinel(sentinel.clone(), token.clone()),
            write_mapping: *write_mapping,
        },
        StepConfig::Enrich {
            key_column,
            value_columns,
            defaults,
            ..
        } => {
            let index = reference.ok_or_else(|| PipelineError::MissingReference {
                key_column: key_column.clone(),
            })?;
            PipelineStep::Enrich(EnrichJoin::new(
                key_column.clone(),
                value_columns.clone(),
                defaults.clone(),
                index,
            ))
        }
    })
}

/// Dedupe plus configured steps, applied to batches in order.
#[derive(Debug)]
pub(crate) struct StepChain {
    dedupe: Option<Deduplicator>,
    steps: Vec<PipelineStep>,
}

impl StepChain {
    pub fn new(dedupe: Option<Deduplicator>, steps: Vec<PipelineStep>) -> Self {
        Self { dedupe, steps }
    }

    pub fn run(&mut self, batch: &mut Batch, ctx: &StepContext<'_>, report: &mut UnitReport) {
        if let Some(dedupe) = &mut self.dedupe {
            let dropped = dedupe.dedupe(batch);
            report.record_drop(DEDUPE_RULE, dropped);
        }
        for step in &mut self.steps {
            step.execute(batch, ctx, report);
            tracing::trace!(step = step.step_name(), rows = batch.len(), "Step complete");
        }
    }

    pub fn mapping_table(&self) -> Option<MappingTable> {
        self.steps.iter().find_map(PipelineStep::mapping_table)
    }
}
