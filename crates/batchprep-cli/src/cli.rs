//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "batchprep",
    version,
    about = "Stream large CSV tables through cleaning, enrichment, imputation, and encoding",
    long_about = "Stream large CSV tables through a configured sequence of transforms.\n\n\
                  Inputs are read in bounded batches and written as they complete, so\n\
                  memory use does not grow with input size."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow cell values in log output.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a pipeline over one or more CSV files.
    Run(RunArgs),

    /// Validate a pipeline config and print its steps.
    Check(CheckArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Input CSV files; each one is processed and written separately.
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Pipeline config (TOML).
    #[arg(long = "config", short = 'c', value_name = "PATH")]
    pub config: PathBuf,

    /// Reference CSV for enrich steps (overrides the config).
    #[arg(long = "reference", value_name = "PATH")]
    pub reference: Option<PathBuf>,

    /// Rows per batch (overrides the config).
    #[arg(long = "batch-capacity", value_name = "ROWS")]
    pub batch_capacity: Option<usize>,

    /// Output directory (overrides the config).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Also write the run report as JSON.
    #[arg(long = "report", value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Pipeline config (TOML).
    #[arg(long = "config", short = 'c', value_name = "PATH")]
    pub config: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
