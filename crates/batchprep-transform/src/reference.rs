//! Reference lookup and enrichment join.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use batchprep_model::{Batch, Row, Schema, Value};

use crate::error::{Result, TransformError};
use crate::warning::SchemaWarning;

/// Immutable key-to-attributes lookup built from a reference table.
///
/// Keys compare as trimmed text. A key seen more than once keeps its last
/// record. Rows without a key are skipped.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    key_column: String,
    value_columns: Vec<String>,
    records: HashMap<String, Vec<Value>>,
}

impl ReferenceIndex {
    /// Indexes `rows` (shaped by `schema`) on `key_column`.
    ///
    /// Value columns absent from `schema` are left out of the index; the join
    /// fills them with defaults.
    pub fn build<I>(
        schema: &Schema,
        rows: I,
        key_column: &str,
        value_columns: &[String],
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Row>,
    {
        let key_position =
            schema
                .position(key_column)
                .ok_or_else(|| TransformError::ReferenceLoad {
                    column: key_column.to_string(),
                })?;
        let (value_columns, positions): (Vec<String>, Vec<usize>) = value_columns
            .iter()
            .filter(|column| column.as_str() != key_column)
            .filter_map(|column| schema.position(column).map(|p| (column.clone(), p)))
            .unzip();

        let mut records = HashMap::new();
        let mut overwritten = 0usize;
        let mut keyless = 0usize;
        for row in rows {
            let Some(key) = row.get(key_position).and_then(Value::key_text) else {
                keyless += 1;
                continue;
            };
            let key = key.into_owned();
            let values = positions
                .iter()
                .map(|&p| row.get(p).cloned().unwrap_or(Value::Missing))
                .collect();
            if records.insert(key, values).is_some() {
                overwritten += 1;
            }
        }

        tracing::debug!(
            key = %key_column,
            keys = records.len(),
            overwritten,
            keyless,
            "Built reference index"
        );

        Ok(Self {
            key_column: key_column.to_string(),
            value_columns,
            records,
        })
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Indexed value columns, in record order.
    pub fn value_columns(&self) -> &[String] {
        &self.value_columns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for `key`, aligned with [`Self::value_columns`].
    pub fn lookup(&self, key: &str) -> Option<&[Value]> {
        self.records.get(key.trim()).map(Vec::as_slice)
    }
}

/// Result of enriching one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichOutcome {
    pub matched: usize,
    pub unmatched: usize,
    pub warnings: Vec<SchemaWarning>,
}

/// Left join of batches against a shared [`ReferenceIndex`].
#[derive(Debug, Clone)]
pub struct EnrichJoin {
    key_column: String,
    value_columns: Vec<String>,
    defaults: BTreeMap<String, String>,
    index: Arc<ReferenceIndex>,
}

impl EnrichJoin {
    pub const STAGE: &'static str = "enrich";

    /// Join on `key_column`, adding `value_columns`. Unmatched rows get the
    /// column's entry in `defaults`, or a missing cell.
    ///
    /// The key column is never a target, even when listed in `value_columns`.
    pub fn new(
        key_column: impl Into<String>,
        mut value_columns: Vec<String>,
        defaults: BTreeMap<String, String>,
        index: Arc<ReferenceIndex>,
    ) -> Self {
        let key_column = key_column.into();
        value_columns.retain(|column| *column != key_column);
        Self {
            key_column,
            value_columns,
            defaults,
            index,
        }
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn value_columns(&self) -> &[String] {
        &self.value_columns
    }

    /// Appends (or overwrites) the value columns on every row. Row count is
    /// unchanged.
    pub fn apply(&self, batch: &mut Batch) -> EnrichOutcome {
        let mut outcome = EnrichOutcome::default();
        let key_position = batch.schema().position(&self.key_column);
        if key_position.is_none() {
            outcome
                .warnings
                .push(SchemaWarning::new(Self::STAGE, &self.key_column, batch.index));
        }

        batch.append_columns(&self.value_columns);
        let schema = Arc::clone(batch.schema());
        // (batch position, index position, default)
        let targets: Vec<(usize, Option<usize>, Value)> = self
            .value_columns
            .iter()
            .filter_map(|column| {
                let position = schema.position(column)?;
                let source = self.index.value_columns().iter().position(|c| c == column);
                let default = self
                    .defaults
                    .get(column)
                    .map_or(Value::Missing, |d| Value::text(d.as_str()));
                Some((position, source, default))
            })
            .collect();

        for row in batch.rows_mut() {
            let record = key_position
                .and_then(|p| row.get(p))
                .and_then(Value::key_text)
                .and_then(|key| self.index.lookup(&key));
            match record {
                Some(record) => {
                    outcome.matched += 1;
                    for (position, source, default) in &targets {
                        let value = source
                            .and_then(|s| record.get(s))
                            .cloned()
                            .unwrap_or_else(|| default.clone());
                        row.set(*position, value);
                    }
                }
                None => {
                    outcome.unmatched += 1;
                    for (position, _, default) in &targets {
                        row.set(*position, default.clone());
                    }
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(rows: &[&[&str]]) -> ReferenceIndex {
        let batch = Batch::from_str_rows(&["disasterNumber", "declarationTitle"], rows).unwrap();
        let (_, schema, rows) = batch.into_parts();
        ReferenceIndex::build(
            &schema,
            rows,
            "disasterNumber",
            &["declarationTitle".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_last_write_wins() {
        let index = reference(&[&["1", "A"], &["1", "B"]]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("1"), Some(&[Value::text("B")][..]));
    }

    #[test]
    fn test_keys_are_trimmed() {
        let index = reference(&[&[" 7 ", "X"]]);
        assert!(index.lookup("7").is_some());
        assert!(index.lookup(" 7").is_some());
    }

    #[test]
    fn test_missing_key_column_fails() {
        let schema = Schema::new(vec!["a".to_string()]).unwrap();
        let result = ReferenceIndex::build(&schema, Vec::new(), "key", &[]);
        assert!(matches!(result, Err(TransformError::ReferenceLoad { column }) if column == "key"));
    }

    #[test]
    fn test_join_matches_and_defaults() {
        let index = Arc::new(reference(&[&["1", "FLOOD"], &["2", "STORM"]]));
        let join = EnrichJoin::new(
            "disasterNumber",
            vec!["declarationTitle".to_string(), "incidentType".to_string()],
            BTreeMap::from([
                ("declarationTitle".to_string(), "No Title Available".to_string()),
                ("incidentType".to_string(), "Unknown Type".to_string()),
            ]),
            index,
        );
        let mut batch =
            Batch::from_str_rows(&["disasterNumber", "county"], &[&["2", "Harris"], &["9", "Polk"]])
                .unwrap();
        let outcome = join.apply(&mut batch);
        assert_eq!((outcome.matched, outcome.unmatched), (1, 1));
        assert_eq!(
            batch.schema().columns(),
            &["disasterNumber", "county", "declarationTitle", "incidentType"]
        );
        assert_eq!(
            batch.rows()[0].values()[2..],
            [Value::text("STORM"), Value::text("Unknown Type")]
        );
        assert_eq!(
            batch.rows()[1].values()[2..],
            [Value::text("No Title Available"), Value::text("Unknown Type")]
        );
    }

    #[test]
    fn test_join_leaves_key_column_alone() {
        let index = Arc::new(reference(&[&["1", "FLOOD"]]));
        let join = EnrichJoin::new(
            "disasterNumber",
            vec!["disasterNumber".to_string(), "declarationTitle".to_string()],
            BTreeMap::from([("disasterNumber".to_string(), "0".to_string())]),
            index,
        );
        assert_eq!(join.value_columns(), &["declarationTitle"]);

        let mut batch =
            Batch::from_str_rows(&["disasterNumber", "county"], &[&["1", "Harris"], &["4", "Polk"]])
                .unwrap();
        let outcome = join.apply(&mut batch);
        assert_eq!((outcome.matched, outcome.unmatched), (1, 1));
        assert_eq!(
            batch.rows()[0].values(),
            &[Value::text("1"), Value::text("Harris"), Value::text("FLOOD")]
        );
        assert_eq!(
            batch.rows()[1].values(),
            &[Value::text("4"), Value::text("Polk"), Value::Missing]
        );
    }

    #[test]
    fn test_join_without_key_column_fills_defaults() {
        let index = Arc::new(reference(&[&["1", "FLOOD"]]));
        let join = EnrichJoin::new(
            "disasterNumber",
            vec!["declarationTitle".to_string()],
            BTreeMap::new(),
            index,
        );
        let mut batch = Batch::from_str_rows(&["county"], &[&["Harris"]]).unwrap();
        let outcome = join.apply(&mut batch);
        assert_eq!(outcome.unmatched, 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.rows()[0].values(), &[Value::text("Harris"), Value::Missing]);
    }
}
