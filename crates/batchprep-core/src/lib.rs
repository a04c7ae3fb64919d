//! Pipeline orchestration for batchprep.
//!
//! A [`PipelineConfig`] lists the transforms to apply; [`run_pipeline`] runs
//! them over each input file batch by batch and returns a [`RunReport`] with
//! per-rule drop counts, per-column fill and impute counts, warnings, and the
//! files written.
//!
//! # Example
//!
//! ```ignore
//! use batchprep_core::{CancellationToken, PipelineConfig, run_pipeline};
//!
//! let config = PipelineConfig::from_file("pipeline.toml".as_ref())?;
//! let report = run_pipeline(&config, &inputs, None, &CancellationToken::new())?;
//! assert!(report.is_conserved());
//! ```

mod cancel;
mod config;
mod error;
mod pipeline;
mod report;
mod steps;
mod targets;

pub use cancel::CancellationToken;
pub use config::{DedupeSetting, OutputConfig, PipelineConfig, StepConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{BatchProgress, run_pipeline, run_pipeline_with_progress};
pub use report::{DEDUPE_RULE, ReferenceSummary, RunReport, UnitReport};
