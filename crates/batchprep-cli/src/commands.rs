use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, info_span};

use batchprep_cli::logging::redact_value;
use batchprep_cli::summary::print_plan;
use batchprep_core::{CancellationToken, PipelineConfig, RunReport, run_pipeline};

use crate::cli::{CheckArgs, RunArgs};

pub fn run(args: &RunArgs) -> Result<RunReport> {
    let mut config = load_config(&args.config)?;
    if let Some(capacity) = args.batch_capacity {
        config.batch_capacity = capacity;
    }
    if let Some(dir) = &args.output_dir {
        config.output.dir.clone_from(dir);
    }
    config
        .validate()
        .context("invalid pipeline settings after applying command-line overrides")?;

    let run_span = info_span!("run", config = %args.config.display(), inputs = args.inputs.len());
    let _run_guard = run_span.enter();
    info!(
        steps = config.steps.len(),
        batch_capacity = config.batch_capacity,
        output = %config.output.dir.display(),
        "Starting pipeline"
    );

    // No signal handler: the binary always runs to completion. Embedders cancel
    // through a cloned token.
    let cancel = CancellationToken::new();
    let report = run_pipeline(&config, &args.inputs, args.reference.as_deref(), &cancel)
        .context("pipeline run failed")?;

    for unit in &report.units {
        for (column, statistic) in unit.statistics.iter().flatten() {
            debug!(
                input = %unit.input.display(),
                column = %column,
                value = redact_value(&statistic.to_string()),
                "Imputation statistic"
            );
        }
    }

    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }
    Ok(report)
}

pub fn check(args: &CheckArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    print_plan(&config);
    Ok(())
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::from_file(path)
        .with_context(|| format!("load pipeline config {}", path.display()))
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialize run report")?;
    fs::write(path, json).with_context(|| format!("write run report {}", path.display()))?;
    info!(path = %path.display(), "Run report written");
    Ok(())
}
