//! Stable categorical encoding.
//!
//! Each configured column owns an [`EncodingMap`] that assigns codes in
//! first-seen order and never reassigns them. Missing cells and the sentinel
//! are written as the sentinel token and never receive a code. Encoders are
//! scoped to one processing unit; a new input file starts from empty maps.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use batchprep_model::{Batch, Sentinel, Value};

use crate::error::{Result, TransformError};
use crate::warning::SchemaWarning;

/// Default placeholder for unknown or missing categorical values.
pub const DEFAULT_SENTINEL_TOKEN: &str = "?";

/// Value-to-code table for one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodingMap {
    codes: HashMap<String, usize>,
    values: Vec<String>,
}

impl EncodingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Code for `value`, assigning the next code on first sight.
    pub fn code_for(&mut self, value: &str) -> usize {
        if let Some(&code) = self.codes.get(value) {
            return code;
        }
        let code = self.values.len();
        self.codes.insert(value.to_string(), code);
        self.values.push(value.to_string());
        code
    }

    pub fn get(&self, value: &str) -> Option<usize> {
        self.codes.get(value).copied()
    }

    /// Original value of `code`.
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.values.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(value, code)` pairs in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.values
            .iter()
            .enumerate()
            .map(|(code, value)| (value.as_str(), code))
    }
}

/// One row of the exported mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    #[serde(rename = "Column")]
    pub column: String,
    #[serde(rename = "Original_Value")]
    pub original_value: String,
    #[serde(rename = "Encoded_Value")]
    pub encoded_value: usize,
}

/// Every code assigned during one processing unit, grouped by column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: Vec<MappingEntry>,
}

impl MappingTable {
    pub fn from_entries(entries: Vec<MappingEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuilds per-column maps, for decoding or re-encoding.
    ///
    /// Each column's codes must be exactly `0..n` with no value repeated.
    pub fn to_maps(&self) -> Result<BTreeMap<String, EncodingMap>> {
        let mut grouped: BTreeMap<&str, Vec<&MappingEntry>> = BTreeMap::new();
        for entry in &self.entries {
            grouped.entry(entry.column.as_str()).or_default().push(entry);
        }

        let mut maps = BTreeMap::new();
        for (column, mut entries) in grouped {
            entries.sort_by_key(|entry| entry.encoded_value);
            let mut map = EncodingMap::new();
            for (expected, entry) in entries.iter().enumerate() {
                if entry.encoded_value != expected {
                    return Err(TransformError::InvalidMapping {
                        reason: format!(
                            "column '{column}': expected code {expected}, found {}",
                            entry.encoded_value
                        ),
                    });
                }
                if map.get(&entry.original_value).is_some() {
                    return Err(TransformError::InvalidMapping {
                        reason: format!(
                            "column '{column}': value '{}' has more than one code",
                            entry.original_value
                        ),
                    });
                }
                map.code_for(&entry.original_value);
            }
            maps.insert(column.to_string(), map);
        }
        Ok(maps)
    }
}

/// Result of encoding one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeOutcome {
    /// Cells rewritten to a code.
    pub encoded: usize,
    /// Cells written as the sentinel token.
    pub sentinels: usize,
    pub warnings: Vec<SchemaWarning>,
}

/// Rewrites configured categorical columns to integer codes.
#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    columns: Vec<String>,
    sentinel: Sentinel,
    token: String,
    maps: HashMap<String, EncodingMap>,
}

impl CategoricalEncoder {
    pub const STAGE: &'static str = "encode";

    /// Encoder with the default `"?"` sentinel and token.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            sentinel: Sentinel::text(DEFAULT_SENTINEL_TOKEN),
            token: DEFAULT_SENTINEL_TOKEN.to_string(),
            maps: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_sentinel(mut self, sentinel: Sentinel, token: impl Into<String>) -> Self {
        self.sentinel = sentinel;
        self.token = token.into();
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn map(&self, column: &str) -> Option<&EncodingMap> {
        self.maps.get(column)
    }

    /// Distinct values coded so far, per configured column.
    pub fn distinct_counts(&self) -> BTreeMap<String, usize> {
        self.columns
            .iter()
            .map(|column| (column.clone(), self.maps.get(column).map_or(0, EncodingMap::len)))
            .collect()
    }

    pub fn encode(&mut self, batch: &mut Batch) -> EncodeOutcome {
        let mut outcome = EncodeOutcome::default();
        for column in &self.columns {
            let Some(position) = batch.schema().position(column) else {
                outcome
                    .warnings
                    .push(SchemaWarning::new(Self::STAGE, column, batch.index));
                continue;
            };
            let map = self.maps.entry(column.clone()).or_default();
            for row in batch.rows_mut() {
                let Some(cell) = row.get_mut(position) else {
                    continue;
                };
                if cell.is_missing() || self.sentinel.matches(cell) {
                    *cell = Value::Text(self.token.clone());
                    outcome.sentinels += 1;
                } else {
                    let code = map.code_for(&cell.render());
                    *cell = Value::Text(code.to_string());
                    outcome.encoded += 1;
                }
            }
        }
        outcome
    }

    /// Mapping table in configured column order, then code order.
    pub fn mapping_table(&self) -> MappingTable {
        let entries = self
            .columns
            .iter()
            .filter_map(|column| self.maps.get(column).map(|map| (column, map)))
            .flat_map(|(column, map)| {
                map.iter().map(move |(value, code)| MappingEntry {
                    column: column.clone(),
                    original_value: value.to_string(),
                    encoded_value: code,
                })
            })
            .collect();
        MappingTable::from_entries(entries)
    }
}
