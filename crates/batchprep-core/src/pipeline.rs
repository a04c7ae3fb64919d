//! The batch runner.
//!
//! Each input file is one processing unit, run in up to two passes:
//!
//! 1. **Statistics** (only with global statistics and an impute step): read
//!    the whole input, apply dedupe and the steps before the impute step, and
//!    fold every batch into a [`StatisticsAccumulator`]. Nothing is written.
//! 2. **Transform**: read the input again, apply dedupe and every step, and
//!    write each batch as soon as it is done.
//!
//! Only one batch is resident at a time. Cancellation is checked before each
//! batch; a cancelled unit keeps every batch already written and nothing else.
//!
//! Destinations for every unit are derived and checked before the first unit
//! starts, so a run never writes over its own inputs or over another unit's
//! output.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, info_span, warn};

use batchprep_ingest::{ChunkOptions, ChunkSource, ReferenceLoadOptions, load_reference_table};
use batchprep_model::Batch;
use batchprep_output::{BatchWriter, FanoutWriter, write_mapping_table};
use batchprep_transform::{
    ColumnStatistics, Deduplicator, ImputeColumn, ReferenceIndex, StatisticsAccumulator,
};

use crate::cancel::CancellationToken;
use crate::config::{OutputConfig, PipelineConfig, StepConfig};
use crate::error::{PipelineError, Result};
use crate::report::{ReferenceSummary, RunReport, UnitReport};
use crate::steps::{StepChain, StepContext, build_steps};
use crate::targets::{SinkTarget, UnitTarget, plan_targets};

/// Progress after each written batch of the transform pass.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress<'a> {
    pub input: &'a Path,
    /// Batches written so far for this input.
    pub batches: usize,
    pub rows_read: u64,
    pub rows_written: u64,
}

/// Runs `config` over every input file in order.
///
/// `reference` overrides the reference path of every enrich step. Reference
/// tables are loaded once and shared by all units.
///
/// Fails with [`PipelineError::InvalidConfig`] before anything is read if two
/// inputs would write the same file, or if an output would land on an input
/// or a reference table.
pub fn run_pipeline(
    config: &PipelineConfig,
    inputs: &[PathBuf],
    reference: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    run_pipeline_with_progress(config, inputs, reference, cancel, |_| {})
}

/// [`run_pipeline`], calling `on_batch` after every batch written.
pub fn run_pipeline_with_progress<F>(
    config: &PipelineConfig,
    inputs: &[PathBuf],
    reference: Option<&Path>,
    cancel: &CancellationToken,
    mut on_batch: F,
) -> Result<RunReport>
where
    F: FnMut(&BatchProgress<'_>),
{
    config.validate()?;
    if inputs.is_empty() {
        return Err(PipelineError::NoInputs);
    }
    let targets = plan_targets(config, inputs, reference)?;

    let start = Instant::now();
    let mut report = RunReport::new(config.statistics, config.dedupe);
    let references = info_span!("references")
        .in_scope(|| load_references(config, reference, &mut report.references))?;

    for (input, target) in inputs.iter().zip(&targets) {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let unit_span = info_span!("unit", input = %input.display());
        let unit = unit_span.in_scope(|| {
            run_unit(config, input, target, &references, cancel, &mut on_batch)
        })?;
        let cancelled = unit.cancelled;
        report.units.push(unit);
        if cancelled {
            report.cancelled = true;
            break;
        }
    }

    report.elapsed_ms = elapsed_ms(start);
    info!(
        units = report.units.len(),
        rows_read = report.rows_read(),
        rows_written = report.rows_written(),
        rows_dropped = report.rows_dropped(),
        cancelled = report.cancelled,
        duration_ms = report.elapsed_ms,
        "Run complete"
    );
    Ok(report)
}

/// Loads one reference index per enrich step; other steps get `None`.
fn load_references(
    config: &PipelineConfig,
    reference: Option<&Path>,
    summaries: &mut Vec<ReferenceSummary>,
) -> Result<Vec<Option<Arc<ReferenceIndex>>>> {
    let mut indexes = Vec::with_capacity(config.steps.len());
    for step in &config.steps {
        let StepConfig::Enrich {
            key_column,
            value_columns,
            reference: step_reference,
            fallback_row_limit,
            ..
        } = step
        else {
            indexes.push(None);
            continue;
        };

        let path = reference
            .map(Path::to_path_buf)
            .or_else(|| step_reference.clone())
            .ok_or_else(|| PipelineError::MissingReference {
                key_column: key_column.clone(),
            })?;
        let start = Instant::now();
        let options = ReferenceLoadOptions::default().with_fallback_row_limit(*fallback_row_limit);
        let table = load_reference_table(&path, key_column, value_columns, &options)?;
        let index = ReferenceIndex::build(&table.schema, table.rows, key_column, value_columns)?;

        if table.completeness.is_degraded() {
            warn!(
                path = %path.display(),
                completeness = ?table.completeness,
                "Reference table loaded partially"
            );
        }
        info!(
            path = %path.display(),
            key = %key_column,
            keys = index.len(),
            duration_ms = elapsed_ms(start),
            "Reference table loaded"
        );

        summaries.push(ReferenceSummary {
            path: table.path,
            key_column: key_column.clone(),
            keys: index.len(),
            completeness: table.completeness,
            missing_columns: table.missing_columns,
        });
        indexes.push(Some(Arc::new(index)));
    }
    Ok(indexes)
}

/// Output sink for one unit.
enum Sink {
    Single(BatchWriter),
    Fanout(FanoutWriter),
}

impl Sink {
    fn create(output: &OutputConfig, target: &SinkTarget) -> Result<Self> {
        Ok(match (target, &output.partition_column) {
            (SinkTarget::Directory(dir), Some(column)) => Self::Fanout(FanoutWriter::new(
                dir.clone(),
                column.clone(),
                output.mode,
                output.max_open_files,
            )),
            (SinkTarget::File(path), _) | (SinkTarget::Directory(path), None) => {
                Self::Single(BatchWriter::create(path, output.mode)?)
            }
        })
    }

    /// Writes `batch` and hands its buffer back to `source` when possible.
    fn write(&mut self, batch: Batch, is_first: bool, source: &mut ChunkSource) -> Result<usize> {
        match self {
            Self::Single(writer) => {
                let written = writer.write(&batch, is_first)?;
                source.release(batch);
                Ok(written)
            }
            Self::Fanout(writer) => Ok(writer.write_batch(batch)?),
        }
    }

    /// Closes every file and returns the paths written.
    fn finish(self) -> Result<Vec<PathBuf>> {
        match self {
            Self::Single(writer) => {
                let path = writer.path().to_path_buf();
                writer.finish()?;
                Ok(vec![path])
            }
            Self::Fanout(writer) => Ok(writer
                .finish()?
                .into_iter()
                .map(|destination| destination.path)
                .collect()),
        }
    }
}

fn run_unit(
    config: &PipelineConfig,
    input: &Path,
    target: &UnitTarget,
    references: &[Option<Arc<ReferenceIndex>>],
    cancel: &CancellationToken,
    on_batch: &mut dyn FnMut(&BatchProgress<'_>),
) -> Result<UnitReport> {
    let start = Instant::now();
    let mut unit = UnitReport::new(input.to_path_buf());
    let options = ChunkOptions::default().with_batch_capacity(config.batch_capacity);

    let statistics = if config.needs_statistics_pass() {
        let statistics = info_span!("statistics").in_scope(|| {
            collect_statistics(config, input, references, &options, cancel, &mut unit)
        })?;
        match statistics {
            Some(statistics) => Some(statistics),
            None => {
                info!("Cancelled during statistics pass; nothing written");
                unit.cancelled = true;
                unit.elapsed_ms = elapsed_ms(start);
                return Ok(unit);
            }
        }
    } else {
        None
    };

    let transform_span = info_span!("transform");
    let _transform_guard = transform_span.enter();
    let mut source = ChunkSource::open(input, options)?;
    if cancel.is_cancelled() {
        unit.cancelled = true;
        unit.statistics = statistics;
        unit.elapsed_ms = elapsed_ms(start);
        return Ok(unit);
    }

    let mut sink = Sink::create(&config.output, &target.sink)?;
    let mut chain = StepChain::new(
        config.dedupe.scope().map(Deduplicator::new),
        build_steps(config, references, config.steps.len())?,
    );
    let ctx = StepContext {
        scope: config.statistics,
        statistics: statistics.as_ref(),
    };

    loop {
        if cancel.is_cancelled() {
            info!(batches = unit.batches, "Cancelled; keeping completed batches");
            unit.cancelled = true;
            break;
        }
        let Some(mut batch) = source.next_batch()? else {
            break;
        };
        let index = batch.index;
        let read = batch.len();
        unit.rows_read += read as u64;
        chain.run(&mut batch, &ctx, &mut unit);
        let written = sink.write(batch, unit.batches == 0, &mut source)?;
        unit.rows_written += written as u64;
        unit.batches += 1;
        debug!(batch = index, rows_read = read, rows_written = written, "Batch written");
        on_batch(&BatchProgress {
            input,
            batches: unit.batches,
            rows_read: unit.rows_read,
            rows_written: unit.rows_written,
        });
    }

    if unit.batches == 0 && !unit.cancelled {
        // Header-only output for an input with no data rows.
        let mut batch = Batch::new(0, Arc::clone(source.schema()), Vec::new());
        chain.run(&mut batch, &ctx, &mut unit);
        sink.write(batch, true, &mut source)?;
    }

    unit.outputs = sink.finish()?;
    if let (Some(table), Some(path)) = (chain.mapping_table(), &target.mapping_table) {
        write_mapping_table(path, &table)?;
        unit.mapping_table = Some(path.clone());
    }

    unit.statistics = statistics;
    unit.elapsed_ms = elapsed_ms(start);
    info!(
        batches = unit.batches,
        rows_read = unit.rows_read,
        rows_written = unit.rows_written,
        rows_dropped = unit.rows_dropped(),
        duration_ms = unit.elapsed_ms,
        "Unit complete"
    );
    Ok(unit)
}

/// First pass. Returns `None` if cancelled.
///
/// Dedupe and the steps before the impute step run on fresh instances so the
/// statistics describe the same rows the imputer will see; their counters are
/// discarded.
fn collect_statistics(
    config: &PipelineConfig,
    input: &Path,
    references: &[Option<Arc<ReferenceIndex>>],
    options: &ChunkOptions,
    cancel: &CancellationToken,
    unit: &mut UnitReport,
) -> Result<Option<ColumnStatistics>> {
    let start = Instant::now();
    let Some(impute_step) = config.impute_step() else {
        return Ok(Some(ColumnStatistics::new()));
    };
    let columns: &[ImputeColumn] = match &config.steps[impute_step] {
        StepConfig::Impute { columns } => columns,
        _ => &[],
    };

    let mut source = ChunkSource::open(input, options.clone())?;
    let mut chain = StepChain::new(
        config.dedupe.scope().map(Deduplicator::new),
        build_steps(config, references, impute_step)?,
    );
    let ctx = StepContext {
        scope: config.statistics,
        statistics: None,
    };
    let mut scratch = UnitReport::default();
    let mut accumulator = StatisticsAccumulator::new(columns);

    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let Some(mut batch) = source.next_batch()? else {
            break;
        };
        chain.run(&mut batch, &ctx, &mut scratch);
        unit.record_warnings(accumulator.observe(&batch));
        source.release(batch);
    }

    let batches = accumulator.batches_observed();
    let statistics = accumulator.finalize();
    info!(
        batches,
        columns = statistics.len(),
        duration_ms = elapsed_ms(start),
        "Statistics collected"
    );
    Ok(Some(statistics))
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
