//! Partitioned output: one destination file per partition value.
//!
//! Destinations are discovered from the data. Only `max_open_files` handles
//! are kept open at once; the least recently used one is closed when another
//! is needed. Header state lives with the destination, not the handle, so a
//! reopened destination is appended to without a second header.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use batchprep_model::{Batch, Row, Schema};

use crate::error::{OutputError, Result};
use crate::writer::{BatchWriter, WriteMode};

/// Destination key for rows whose partition value is missing or blank.
pub const MISSING_PARTITION_KEY: &str = "_missing";

/// Default cap on simultaneously open destination files.
pub const DEFAULT_MAX_OPEN_FILES: usize = 64;

/// Replaces every character that is not ASCII alphanumeric with `_`.
pub fn sanitize_destination_key(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Where one destination's rows went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationSummary {
    pub key: String,
    pub path: PathBuf,
    pub rows_written: u64,
}

#[derive(Debug)]
struct Destination {
    path: PathBuf,
    rows_written: u64,
    batches_written: usize,
    /// A handle was opened for it earlier in this run.
    opened: bool,
}

/// Routes rows to per-partition CSV files under one directory.
#[derive(Debug)]
pub struct FanoutWriter {
    dir: PathBuf,
    partition_column: String,
    mode: WriteMode,
    max_open_files: usize,
    destinations: BTreeMap<String, Destination>,
    open: HashMap<String, BatchWriter>,
    /// Open keys, least recently used first.
    recency: VecDeque<String>,
}

impl FanoutWriter {
    pub fn new(
        dir: impl Into<PathBuf>,
        partition_column: impl Into<String>,
        mode: WriteMode,
        max_open_files: usize,
    ) -> Self {
        Self {
            dir: dir.into(),
            partition_column: partition_column.into(),
            mode,
            max_open_files: max_open_files.max(1),
            destinations: BTreeMap::new(),
            open: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn partition_column(&self) -> &str {
        &self.partition_column
    }

    /// Number of destinations created so far.
    pub fn destination_count(&self) -> usize {
        self.destinations.len()
    }

    /// Total data rows written across destinations.
    pub fn rows_written(&self) -> u64 {
        self.destinations.values().map(|d| d.rows_written).sum()
    }

    fn partition_position(&self, schema: &Schema) -> Result<usize> {
        schema
            .position(&self.partition_column)
            .ok_or_else(|| OutputError::PartitionColumnMissing {
                column: self.partition_column.clone(),
            })
    }

    /// Destination key for `row`.
    pub fn route(&self, row: &Row, schema: &Schema) -> Result<String> {
        let position = self.partition_position(schema)?;
        Ok(route_at(row, position))
    }

    /// Writes a batch, one atomic write per destination it touches.
    ///
    /// Rows keep their relative order within each destination.
    pub fn write_batch(&mut self, batch: Batch) -> Result<usize> {
        let position = self.partition_position(batch.schema())?;
        let (index, schema, rows) = batch.into_parts();
        let total = rows.len();

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
        for row in rows {
            let key = route_at(&row, position);
            groups
                .entry(key)
                .or_insert_with_key(|key| {
                    order.push(key.clone());
                    Vec::new()
                })
                .push(row);
        }

        for key in order {
            let Some(rows) = groups.remove(&key) else {
                continue;
            };
            let part = Batch::new(index, Arc::clone(&schema), rows);
            self.write_part(&key, &part)?;
        }
        Ok(total)
    }

    fn write_part(&mut self, key: &str, part: &Batch) -> Result<()> {
        let dir = &self.dir;
        let destination = self.destinations.entry(key.to_string()).or_insert_with(|| {
            let path = dir.join(format!("{key}.csv"));
            tracing::info!(destination = %key, path = %path.display(), "New output destination");
            Destination {
                path,
                rows_written: 0,
                batches_written: 0,
                opened: false,
            }
        });
        // Only the first open in a run may truncate.
        let mode = if destination.opened {
            WriteMode::Append
        } else {
            self.mode
        };
        destination.opened = true;
        let is_first = destination.batches_written == 0;
        let path = destination.path.clone();

        let written = self.writer_for(key, &path, mode)?.write(part, is_first)?;
        if let Some(destination) = self.destinations.get_mut(key) {
            destination.rows_written += written as u64;
            destination.batches_written += 1;
        }
        Ok(())
    }

    fn writer_for(&mut self, key: &str, path: &Path, mode: WriteMode) -> Result<&mut BatchWriter> {
        if !self.open.contains_key(key) {
            self.evict_to_fit()?;
        }
        if let Some(position) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(position);
        }
        self.recency.push_back(key.to_string());

        match self.open.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(BatchWriter::create(path, mode)?)),
        }
    }

    fn evict_to_fit(&mut self) -> Result<()> {
        while self.open.len() >= self.max_open_files {
            let Some(evicted) = self.recency.pop_front() else {
                break;
            };
            if let Some(writer) = self.open.remove(&evicted) {
                tracing::debug!(destination = %evicted, "Closing least recently used output");
                writer.finish()?;
            }
        }
        Ok(())
    }

    /// Flushes and closes every destination.
    pub fn finish(mut self) -> Result<Vec<DestinationSummary>> {
        for (_, writer) in self.open.drain() {
            writer.finish()?;
        }
        Ok(self
            .destinations
            .into_iter()
            .map(|(key, destination)| DestinationSummary {
                key,
                path: destination.path,
                rows_written: destination.rows_written,
            })
            .collect())
    }
}

fn route_at(row: &Row, position: usize) -> String {
    match row.get(position).map(|value| value.render()) {
        Some(text) if !text.trim().is_empty() => sanitize_destination_key(&text),
        _ => MISSING_PARTITION_KEY.to_string(),
    }
}
