//! Pipeline configuration.
//!
//! A pipeline is described in TOML:
//!
//! ```toml
//! batch_capacity = 50000
//! statistics = "global"
//! dedupe = "batch"
//!
//! [[steps]]
//! kind = "drop_columns"
//! columns = ["highWaterLocation"]
//!
//! [[steps]]
//! kind = "encode"
//! columns = ["residenceType", "county"]
//!
//! [output]
//! dir = "encoded"
//! suffix = "_encoded"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use batchprep_ingest::{DEFAULT_BATCH_CAPACITY, DEFAULT_FALLBACK_ROW_LIMIT};
use batchprep_model::Sentinel;
use batchprep_output::{DEFAULT_MAX_OPEN_FILES, WriteMode};
use batchprep_transform::{
    DEFAULT_SENTINEL_TOKEN, DedupeScope, FillPolicy, ImputeColumn, StatisticsScope,
};

use crate::error::{PipelineError, Result};

// =============================================================================
// ROOT CONFIG
// =============================================================================

/// A complete pipeline description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Rows per batch.
    pub batch_capacity: usize,

    /// Where imputation statistics come from. One scope per run.
    pub statistics: StatisticsScope,

    /// Exact-duplicate removal, always run before the configured steps.
    pub dedupe: DedupeSetting,

    /// Transforms applied to every batch, in order.
    pub steps: Vec<StepConfig>,

    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            statistics: StatisticsScope::default(),
            dedupe: DedupeSetting::default(),
            steps: Vec::new(),
            output: OutputConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads and validates a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a TOML config.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| PipelineError::invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.batch_capacity == 0 {
            return Err(PipelineError::invalid("batch_capacity must be at least 1"));
        }
        if self.output.max_open_files == 0 {
            return Err(PipelineError::invalid("output.max_open_files must be at least 1"));
        }
        if let Some(column) = &self.output.partition_column
            && column.trim().is_empty()
        {
            return Err(PipelineError::invalid("output.partition_column is empty"));
        }

        let mut encode_steps = 0;
        let mut impute_steps = 0;
        for (index, step) in self.steps.iter().enumerate() {
            let name = step.kind();
            let columns = step.columns();
            if columns.is_empty() && !matches!(step, StepConfig::FillMissing { .. }) {
                return Err(PipelineError::invalid(format!(
                    "step {index} ({name}) names no columns"
                )));
            }
            if let Some(column) = columns.iter().find(|c| c.trim().is_empty()) {
                return Err(PipelineError::invalid(format!(
                    "step {index} ({name}) has an empty column name '{column}'"
                )));
            }
            match step {
                StepConfig::Encode { .. } => encode_steps += 1,
                StepConfig::Impute { .. } => impute_steps += 1,
                StepConfig::Enrich { key_column, .. } if key_column.trim().is_empty() => {
                    return Err(PipelineError::invalid(format!(
                        "step {index} (enrich) has an empty key_column"
                    )));
                }
                _ => {}
            }
        }
        if encode_steps > 1 {
            return Err(PipelineError::invalid("at most one encode step is allowed"));
        }
        if impute_steps > 1 {
            return Err(PipelineError::invalid("at most one impute step is allowed"));
        }
        Ok(())
    }

    /// Position of the impute step, if any.
    pub fn impute_step(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| matches!(step, StepConfig::Impute { .. }))
    }

    /// Whether an encode step exports its mapping table.
    pub fn writes_mapping_table(&self) -> bool {
        self.steps.iter().any(|step| {
            matches!(
                step,
                StepConfig::Encode {
                    write_mapping: true,
                    ..
                }
            )
        })
    }

    /// Whether a read-only statistics pass precedes the transform pass.
    pub fn needs_statistics_pass(&self) -> bool {
        self.statistics == StatisticsScope::Global && self.impute_step().is_some()
    }
}

// =============================================================================
// DEDUPE
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeSetting {
    #[default]
    Off,
    /// Within each batch only.
    Batch,
    /// Across every batch of a processing unit.
    Global,
}

impl DedupeSetting {
    pub fn scope(self) -> Option<DedupeScope> {
        match self {
            Self::Off => None,
            Self::Batch => Some(DedupeScope::Batch),
            Self::Global => Some(DedupeScope::Global),
        }
    }
}

impl std::fmt::Display for DedupeSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::Batch => f.write_str("batch"),
            Self::Global => f.write_str("global"),
        }
    }
}

// =============================================================================
// STEPS
// =============================================================================

fn default_filter_sentinel() -> Sentinel {
    Sentinel::text("Unknown")
}

fn default_encode_sentinel() -> Sentinel {
    Sentinel::text(DEFAULT_SENTINEL_TOKEN)
}

fn default_token() -> String {
    DEFAULT_SENTINEL_TOKEN.to_string()
}

fn default_true() -> bool {
    true
}

fn default_fallback_row_limit() -> usize {
    DEFAULT_FALLBACK_ROW_LIMIT
}

/// One transform in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum StepConfig {
    /// Remove columns; absent ones are ignored.
    DropColumns { columns: Vec<String> },

    /// Replace missing cells.
    FillMissing {
        #[serde(default)]
        fill: FillPolicy,
        /// Restrict to these columns; all columns when omitted.
        #[serde(default)]
        columns: Option<Vec<String>>,
        #[serde(default)]
        exclude: Vec<String>,
    },

    /// Drop rows where any column holds the sentinel.
    FilterRows {
        columns: Vec<String>,
        #[serde(default = "default_filter_sentinel")]
        sentinel: Sentinel,
        /// Rule name for drop accounting; `filter:<sentinel>` by default.
        #[serde(default)]
        name: Option<String>,
    },

    /// Replace sentinels with a mode or median.
    Impute { columns: Vec<ImputeColumn> },

    /// Replace categorical values with stable integer codes.
    Encode {
        columns: Vec<String>,
        #[serde(default = "default_encode_sentinel")]
        sentinel: Sentinel,
        #[serde(default = "default_token")]
        token: String,
        /// Write `<stem>_encoding.csv` next to the output.
        #[serde(default = "default_true")]
        write_mapping: bool,
    },

    /// Left join against a reference table.
    Enrich {
        key_column: String,
        value_columns: Vec<String>,
        /// Fill for unmatched rows, per value column.
        #[serde(default)]
        defaults: BTreeMap<String, String>,
        /// Reference CSV; the runner's reference path takes precedence.
        #[serde(default)]
        reference: Option<PathBuf>,
        #[serde(default = "default_fallback_row_limit")]
        fallback_row_limit: usize,
    },
}

impl StepConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DropColumns { .. } => "drop_columns",
            Self::FillMissing { .. } => "fill_missing",
            Self::FilterRows { .. } => "filter_rows",
            Self::Impute { .. } => "impute",
            Self::Encode { .. } => "encode",
            Self::Enrich { .. } => "enrich",
        }
    }

    /// Column names the step refers to.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::DropColumns { columns }
            | Self::FilterRows { columns, .. }
            | Self::Encode { columns, .. } => columns.iter().map(String::as_str).collect(),
            Self::FillMissing {
                columns, exclude, ..
            } => columns
                .iter()
                .flatten()
                .chain(exclude)
                .map(String::as_str)
                .collect(),
            Self::Impute { columns } => columns.iter().map(|c| c.column.as_str()).collect(),
            Self::Enrich {
                key_column,
                value_columns,
                ..
            } => std::iter::once(key_column)
                .chain(value_columns)
                .map(String::as_str)
                .collect(),
        }
    }

    /// One-line description for plan listings.
    pub fn describe(&self) -> String {
        match self {
            Self::DropColumns { columns } => format!("drop {}", columns.join(", ")),
            Self::FillMissing {
                fill,
                columns,
                exclude,
            } => {
                let policy = match fill {
                    FillPolicy::Constant { token } => format!("constant {token:?}"),
                    FillPolicy::ByColumnName { rules, fallback } => {
                        format!("{} name rules, fallback {fallback:?}", rules.len())
                    }
                };
                let scope = columns
                    .as_ref()
                    .map_or_else(|| "all columns".to_string(), |c| c.join(", "));
                if exclude.is_empty() {
                    format!("fill {scope} ({policy})")
                } else {
                    format!("fill {scope} except {} ({policy})", exclude.join(", "))
                }
            }
            Self::FilterRows {
                columns, sentinel, ..
            } => format!("drop rows where {} = {sentinel}", columns.join(" | ")),
            Self::Impute { columns } => {
                let parts: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{} ({:?} of non-{})", c.column, c.strategy, c.sentinel))
                    .collect();
                format!("impute {}", parts.join(", "))
            }
            Self::Encode { columns, token, .. } => {
                format!("encode {} (unknown -> {token:?})", columns.join(", "))
            }
            Self::Enrich {
                key_column,
                value_columns,
                ..
            } => format!("join on {key_column}: add {}", value_columns.join(", ")),
        }
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Where and how results are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,

    /// Appended to the input stem: `<dir>/<stem><suffix>.csv`.
    pub suffix: String,

    pub mode: WriteMode,

    /// Fan rows out to one file per value of this column.
    pub partition_column: Option<String>,

    /// Open file cap for fan-out.
    pub max_open_files: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            suffix: "_processed".to_string(),
            mode: WriteMode::default(),
            partition_column: None,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchprep_transform::ImputeStrategy;

    #[test]
    fn test_defaults_from_empty_config() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.batch_capacity, DEFAULT_BATCH_CAPACITY);
        assert_eq!(config.statistics, StatisticsScope::Global);
        assert_eq!(config.dedupe, DedupeSetting::Off);
        assert!(config.steps.is_empty());
        assert_eq!(config.output.suffix, "_processed");
    }

    #[test]
    fn test_full_config() {
        let config = PipelineConfig::from_toml_str(
            r#"
batch_capacity = 50000
statistics = "per_batch"
dedupe = "global"

[[steps]]
kind = "enrich"
key_column = "disasterNumber"
value_columns = ["incidentType", "declarationTitle"]
defaults = { incidentType = "Unknown Type" }

[[steps]]
kind = "fill_missing"
exclude = ["incidentType"]

[[steps]]
kind = "filter_rows"
columns = ["incidentType"]

[[steps]]
kind = "impute"
columns = [
    { column = "applicantAge", strategy = "mode", sentinel = "?" },
    { column = "repairAmount", strategy = "median", sentinel = 0 },
]

[[steps]]
kind = "encode"
columns = ["county"]

[output]
dir = "out"
partition_column = "incidentType"
mode = "append"
"#,
        )
        .unwrap();

        assert_eq!(config.batch_capacity, 50_000);
        assert_eq!(config.statistics, StatisticsScope::PerBatch);
        assert_eq!(config.dedupe.scope(), Some(DedupeScope::Global));
        assert_eq!(config.steps.len(), 5);
        assert_eq!(config.impute_step(), Some(3));
        assert!(!config.needs_statistics_pass());
        match &config.steps[3] {
            StepConfig::Impute { columns } => {
                assert_eq!(columns[0].strategy, ImputeStrategy::Mode);
                assert_eq!(columns[0].sentinel, Sentinel::text("?"));
                assert_eq!(columns[1].sentinel, Sentinel::Number(0.0));
            }
            other => panic!("unexpected step {other:?}"),
        }
        match &config.steps[2] {
            StepConfig::FilterRows { sentinel, .. } => {
                assert_eq!(*sentinel, Sentinel::text("Unknown"));
            }
            other => panic!("unexpected step {other:?}"),
        }
        assert_eq!(config.output.mode, WriteMode::Append);
        assert_eq!(config.output.partition_column.as_deref(), Some("incidentType"));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let result = PipelineConfig::from_toml_str("batch_capacity = 0");
        assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
    }

    #[test]
    fn test_rejects_two_encode_steps() {
        let result = PipelineConfig::from_toml_str(
            r#"
[[steps]]
kind = "encode"
columns = ["a"]

[[steps]]
kind = "encode"
columns = ["b"]
"#,
        );
        assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
    }

    #[test]
    fn test_rejects_unknown_fields_and_kinds() {
        assert!(PipelineConfig::from_toml_str("batch_size = 10").is_err());
        assert!(PipelineConfig::from_toml_str("[[steps]]\nkind = \"sort\"\n").is_err());
        assert!(PipelineConfig::from_toml_str("dedupe = \"sometimes\"").is_err());
    }

    #[test]
    fn test_rejects_empty_column_names() {
        let result =
            PipelineConfig::from_toml_str("[[steps]]\nkind = \"drop_columns\"\ncolumns = [\" \"]\n");
        assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
    }

    #[test]
    fn test_describe_steps() {
        let step = StepConfig::Enrich {
            key_column: "disasterNumber".to_string(),
            value_columns: vec!["incidentType".to_string()],
            defaults: BTreeMap::new(),
            reference: None,
            fallback_row_limit: DEFAULT_FALLBACK_ROW_LIMIT,
        };
        assert_eq!(step.describe(), "join on disasterNumber: add incidentType");
        let step = StepConfig::DropColumns {
            columns: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(step.describe(), "drop a, b");
    }
}
