//! Reference table loading.
//!
//! Reference tables (disaster declarations, lookup lists) are small enough to
//! load whole, so they are read in one go with Polars, projected to the join
//! key and the enrichment columns. When that read fails (ragged rows, quoting
//! problems), loading falls back to a bounded streaming read and reports the
//! result as [`LoadCompleteness::Degraded`] instead of failing outright.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use batchprep_model::{Row, Schema, Value};

use crate::error::{IngestError, Result};
use crate::header::{normalize_header, normalize_header_record, read_raw_csv_header};
use crate::polars_utils::any_to_value;
use crate::source::decode_record;

/// Default row cap for the degraded streaming fallback.
pub const DEFAULT_FALLBACK_ROW_LIMIT: usize = 1_000_000;

/// Options for reference table loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceLoadOptions {
    /// Maximum rows read when the full read fails. Defaults to 1000000.
    pub fallback_row_limit: usize,
}

impl Default for ReferenceLoadOptions {
    fn default() -> Self {
        Self {
            fallback_row_limit: DEFAULT_FALLBACK_ROW_LIMIT,
        }
    }
}

impl ReferenceLoadOptions {
    /// Set the fallback row limit.
    pub fn with_fallback_row_limit(mut self, limit: usize) -> Self {
        self.fallback_row_limit = limit;
        self
    }
}

/// How much of the reference table made it into memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadCompleteness {
    /// Every row was loaded by the full read.
    Complete,
    /// The full read failed; rows come from the bounded fallback.
    Degraded {
        rows_loaded: usize,
        /// True when the fallback stopped at its row cap.
        limit_reached: bool,
        /// Why the full read failed.
        reason: String,
    },
}

impl LoadCompleteness {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// A projected, fully materialized reference table.
#[derive(Debug, Clone)]
pub struct ReferenceTable {
    pub path: PathBuf,
    /// Key column first, then the value columns that exist in the file.
    pub schema: Arc<Schema>,
    pub rows: Vec<Row>,
    pub completeness: LoadCompleteness,
    /// Requested value columns absent from the file.
    pub missing_columns: Vec<String>,
}

/// Loads the key column and `value_columns` of a reference CSV.
///
/// Fails with [`IngestError::MissingKeyColumn`] if the key column is absent.
/// Requested value columns that are absent are skipped with a warning and
/// listed in [`ReferenceTable::missing_columns`].
pub fn load_reference_table(
    path: &Path,
    key_column: &str,
    value_columns: &[String],
    options: &ReferenceLoadOptions,
) -> Result<ReferenceTable> {
    let raw_header = read_raw_csv_header(path)?;
    let header: Vec<String> = raw_header
        .iter()
        .map(String::as_str)
        .map(normalize_header)
        .collect();
    if !header.iter().any(|c| c == key_column) {
        return Err(IngestError::MissingKeyColumn {
            column: key_column.to_string(),
            path: path.to_path_buf(),
        });
    }

    let mut projection = vec![key_column.to_string()];
    let mut missing_columns = Vec::new();
    for column in value_columns {
        if column == key_column || projection.contains(column) {
            continue;
        }
        if header.contains(column) {
            projection.push(column.clone());
        } else {
            tracing::warn!(
                path = %path.display(),
                column = %column,
                "Reference column not found; enrichment will use defaults"
            );
            missing_columns.push(column.clone());
        }
    }

    let schema = Arc::new(
        Schema::new(projection.clone()).map_err(|source| IngestError::InvalidSchema {
            path: path.to_path_buf(),
            source,
        })?,
    );

    // Polars matches names exactly as written in the file.
    let raw_projection: Vec<String> = projection
        .iter()
        .map(|name| {
            header
                .iter()
                .position(|c| c == name)
                .map_or_else(|| name.clone(), |p| raw_header[p].clone())
        })
        .collect();

    let (rows, completeness) = match read_full(path, &raw_projection) {
        Ok(rows) => (rows, LoadCompleteness::Complete),
        Err(error) => {
            let reason = error.to_string();
            tracing::warn!(
                path = %path.display(),
                error = %reason,
                limit = options.fallback_row_limit,
                "Full reference read failed; falling back to bounded streaming read"
            );
            let (rows, limit_reached) =
                read_bounded(path, &projection, options.fallback_row_limit).map_err(|e| {
                    IngestError::ReferenceLoad {
                        path: path.to_path_buf(),
                        reason: format!("{reason}; fallback failed: {e}"),
                    }
                })?;
            let completeness = LoadCompleteness::Degraded {
                rows_loaded: rows.len(),
                limit_reached,
                reason,
            };
            (rows, completeness)
        }
    };

    tracing::info!(
        path = %path.display(),
        rows = rows.len(),
        columns = schema.len(),
        degraded = completeness.is_degraded(),
        "Loaded reference table"
    );

    Ok(ReferenceTable {
        path: path.to_path_buf(),
        schema,
        rows,
        completeness,
        missing_columns,
    })
}

/// Full read of the projected columns, every column as a string.
///
/// `projection` holds header names as they appear in the file.
fn read_full(path: &Path, projection: &[String]) -> Result<Vec<Row>> {
    let columns: Arc<[PlSmallStr]> = projection
        .iter()
        .map(|name| PlSmallStr::from(name.as_str()))
        .collect();

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_columns(Some(columns))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IngestError::Csv {
            path: path.to_path_buf(),
            line: None,
            message: e.to_string(),
        })?
        .finish()
        .map_err(|e| IngestError::Csv {
            path: path.to_path_buf(),
            line: None,
            message: e.to_string(),
        })?;

    let mut selected = Vec::with_capacity(projection.len());
    for name in projection {
        selected.push(df.column(name)?);
    }

    let mut rows = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let mut values = Vec::with_capacity(selected.len());
        for column in &selected {
            values.push(any_to_value(column.get(row_idx)?));
        }
        rows.push(Row::new(values));
    }
    Ok(rows)
}

/// Streaming read of at most `limit` rows, tolerating ragged records.
///
/// Returns the rows and whether the limit cut the read short.
fn read_bounded(path: &Path, projection: &[String], limit: usize) -> Result<(Vec<Row>, bool)> {
    let file = std::fs::File::open(path).map_err(|e| IngestError::from_open(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);
    let header = normalize_header_record(
        reader
            .byte_headers()
            .map_err(|e| IngestError::from_csv(path, e))?,
    );
    let positions: Vec<Option<usize>> = projection
        .iter()
        .map(|name| header.iter().position(|c| c == name))
        .collect();

    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();
    loop {
        if rows.len() >= limit {
            let more = reader
                .read_byte_record(&mut record)
                .map_err(|e| IngestError::from_csv(path, e))?;
            return Ok((rows, more));
        }
        let more = reader
            .read_byte_record(&mut record)
            .map_err(|e| IngestError::from_csv(path, e))?;
        if !more {
            return Ok((rows, false));
        }
        let full = decode_record(&record);
        let values = positions
            .iter()
            .map(|position| {
                position
                    .and_then(|p| full.get(p).cloned())
                    .unwrap_or(Value::Missing)
            })
            .collect();
        rows.push(Row::new(values));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn test_read_bounded_pads_short_rows() {
        let file = create_temp_csv("k,v,w\n1,a\n2,b,c\n");
        let (rows, limited) = read_bounded(
            file.path(),
            &["k".to_string(), "w".to_string()],
            10,
        )
        .unwrap();
        assert!(!limited);
        assert_eq!(rows[0].values(), &[Value::text("1"), Value::Missing]);
        assert_eq!(rows[1].values(), &[Value::text("2"), Value::text("c")]);
    }

    #[test]
    fn test_read_bounded_reports_limit() {
        let file = create_temp_csv("k\n1\n2\n3\n");
        let (rows, limited) = read_bounded(file.path(), &["k".to_string()], 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(limited);

        let (rows, limited) = read_bounded(file.path(), &["k".to_string()], 3).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(!limited);
    }
}
