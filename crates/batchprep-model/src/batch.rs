//! Schema, rows, and batches.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ModelError, Result};
use crate::value::Value;

/// Ordered column names shared by every row of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Builds a schema, rejecting duplicate column names.
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(columns.len());
        for (position, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), position).is_some() {
                return Err(ModelError::DuplicateColumn {
                    column: name.clone(),
                });
            }
        }
        Ok(Self { columns, index })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Schema with `extra` appended; names already present keep their position.
    pub fn with_appended(&self, extra: &[String]) -> Self {
        let mut columns = self.columns.clone();
        for name in extra {
            if !self.contains(name) && !columns.contains(name) {
                columns.push(name.clone());
            }
        }
        let index = columns
            .iter()
            .enumerate()
            .map(|(position, name)| (name.clone(), position))
            .collect();
        Self { columns, index }
    }

    /// Schema without the given columns, plus the kept positions in order.
    pub fn without(&self, removed: &[String]) -> (Self, Vec<usize>) {
        let keep: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| !removed.contains(name))
            .map(|(position, _)| position)
            .collect();
        let columns: Vec<String> = keep.iter().map(|&i| self.columns[i].clone()).collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(position, name)| (name.clone(), position))
            .collect();
        (Self { columns, index }, keep)
    }
}

/// One record, positionally aligned with its batch's [`Schema`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, position: usize) -> Option<&Value> {
        self.values.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut Value> {
        self.values.get_mut(position)
    }

    /// Sets a cell, extending the row with missing cells if needed.
    pub fn set(&mut self, position: usize, value: Value) {
        if position >= self.values.len() {
            self.values.resize(position + 1, Value::Missing);
        }
        self.values[position] = value;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keeps only the given positions, in the given order.
    pub fn project(&mut self, keep: &[usize]) {
        let mut taken: Vec<Option<Value>> = std::mem::take(&mut self.values)
            .into_iter()
            .map(Some)
            .collect();
        self.values = keep
            .iter()
            .map(|&i| taken.get_mut(i).and_then(Option::take).unwrap_or(Value::Missing))
            .collect();
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// A bounded, contiguous slice of a dataset.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Zero-based position of this batch in its source.
    pub index: usize,
    schema: Arc<Schema>,
    rows: Vec<Row>,
}

impl Batch {
    pub fn new(index: usize, schema: Arc<Schema>, rows: Vec<Row>) -> Self {
        Self {
            index,
            schema,
            rows,
        }
    }

    /// Builds a batch from string literals, treating `""` as missing.
    ///
    /// Intended for tests and small fixtures.
    pub fn from_str_rows(columns: &[&str], rows: &[&[&str]]) -> Result<Self> {
        let schema = Schema::new(columns.iter().map(|c| (*c).to_string()).collect())?;
        let width = schema.len();
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != width {
                return Err(ModelError::RowWidth {
                    expected: width,
                    found: row.len(),
                });
            }
            out.push(Row::new(row.iter().map(|v| Value::from_field(v)).collect()));
        }
        Ok(Self::new(0, Arc::new(schema), out))
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, in row order. Empty if the column is absent.
    pub fn column_values<'a>(&'a self, column: &str) -> impl Iterator<Item = &'a Value> + 'a {
        let position = self.schema.position(column);
        self.rows
            .iter()
            .filter_map(move |row| position.and_then(|p| row.get(p)))
    }

    /// Keeps rows for which `keep` returns true; returns how many were removed.
    pub fn retain_rows<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Row) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(keep);
        before - self.rows.len()
    }

    /// Appends columns (no-op for names already present), filling new cells with missing.
    pub fn append_columns(&mut self, names: &[String]) {
        let schema = self.schema.with_appended(names);
        if schema.len() == self.schema.len() {
            return;
        }
        let width = schema.len();
        for row in &mut self.rows {
            row.values.resize(width, Value::Missing);
        }
        self.schema = Arc::new(schema);
    }

    /// Removes the named columns that exist; returns the names actually removed.
    pub fn drop_columns(&mut self, names: &[String]) -> Vec<String> {
        let removed: Vec<String> = names
            .iter()
            .filter(|name| self.schema.contains(name))
            .cloned()
            .collect();
        if removed.is_empty() {
            return removed;
        }
        let (schema, keep) = self.schema.without(&removed);
        for row in &mut self.rows {
            row.project(&keep);
        }
        self.schema = Arc::new(schema);
        removed
    }

    /// Splits the batch into its parts so the row buffer can be recycled.
    pub fn into_parts(self) -> (usize, Arc<Schema>, Vec<Row>) {
        (self.index, self.schema, self.rows)
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}
