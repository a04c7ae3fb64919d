//! Bounded-memory sequential batch reading.
//!
//! [`ChunkSource`] streams a CSV file as a sequence of [`Batch`]es of at most
//! `batch_capacity` rows. Only one batch worth of rows is materialized at a
//! time; handing a consumed batch back through [`ChunkSource::release`] lets
//! the next read reuse its row buffer instead of allocating a fresh one.
//!
//! # Usage
//!
//! ```ignore
//! use batchprep_ingest::{ChunkOptions, ChunkSource};
//!
//! let mut source = ChunkSource::open(&path, ChunkOptions::default().with_batch_capacity(50_000))?;
//! while let Some(batch) = source.next_batch()? {
//!     // ... transform and write ...
//!     source.release(batch);
//! }
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use batchprep_model::{Batch, Row, Schema, Value};

use crate::error::{IngestError, Result};
use crate::header::normalize_header_record;

/// Default number of rows per batch.
pub const DEFAULT_BATCH_CAPACITY: usize = 100_000;

/// Options for batch reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkOptions {
    /// Maximum rows per batch. Defaults to 100000.
    pub batch_capacity: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            batch_capacity: DEFAULT_BATCH_CAPACITY,
        }
    }
}

impl ChunkOptions {
    /// Set the batch capacity.
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = capacity;
        self
    }
}

/// Lazy, finite, non-restartable reader of row batches.
pub struct ChunkSource {
    path: PathBuf,
    reader: csv::Reader<File>,
    schema: Arc<Schema>,
    capacity: usize,
    record: csv::ByteRecord,
    spare: Option<Vec<Row>>,
    next_index: usize,
    rows_read: usize,
    exhausted: bool,
}

impl std::fmt::Debug for ChunkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSource")
            .field("path", &self.path)
            .field("columns", &self.schema.len())
            .field("capacity", &self.capacity)
            .field("batches_read", &self.next_index)
            .field("rows_read", &self.rows_read)
            .finish()
    }
}

impl ChunkSource {
    /// Opens `path` and reads its header row.
    ///
    /// Fails if the file cannot be opened, is empty, or its header does not
    /// yield a usable schema.
    pub fn open(path: impl AsRef<Path>, options: ChunkOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if options.batch_capacity == 0 {
            return Err(IngestError::InvalidOptions {
                reason: "batch capacity must be at least one row".to_string(),
            });
        }

        let file = File::open(&path).map_err(|e| IngestError::from_open(&path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(file);
        let header = reader
            .byte_headers()
            .map_err(|e| IngestError::from_csv(&path, e))?
            .clone();
        let columns = normalize_header_record(&header);
        if columns.is_empty() || columns.iter().all(String::is_empty) {
            return Err(IngestError::MissingHeader { path });
        }
        let schema = Schema::new(columns).map_err(|source| IngestError::InvalidSchema {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(
            path = %path.display(),
            columns = schema.len(),
            batch_capacity = options.batch_capacity,
            "Opened chunk source"
        );

        Ok(Self {
            path,
            reader,
            schema: Arc::new(schema),
            capacity: options.batch_capacity,
            record: csv::ByteRecord::new(),
            spare: None,
            next_index: 0,
            rows_read: 0,
            exhausted: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Total data rows produced so far.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Number of batches produced so far.
    pub fn batches_read(&self) -> usize {
        self.next_index
    }

    /// Reads the next batch, or `None` once the input is exhausted.
    ///
    /// Batches are non-empty; the last one may hold fewer than
    /// `batch_capacity` rows.
    pub fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut rows = self.spare.take().unwrap_or_default();
        rows.clear();
        rows.reserve(self.capacity.min(DEFAULT_BATCH_CAPACITY));

        while rows.len() < self.capacity {
            let more = self
                .reader
                .read_byte_record(&mut self.record)
                .map_err(|e| IngestError::from_csv(&self.path, e))?;
            if !more {
                self.exhausted = true;
                break;
            }
            rows.push(decode_record(&self.record));
        }

        if rows.is_empty() {
            self.spare = Some(rows);
            return Ok(None);
        }

        let index = self.next_index;
        self.next_index += 1;
        self.rows_read += rows.len();
        tracing::trace!(batch = index, rows = rows.len(), "Read batch");
        Ok(Some(Batch::new(index, Arc::clone(&self.schema), rows)))
    }

    /// Hands a consumed batch back so its row buffer is recycled.
    ///
    /// The rows are dropped here, before the next batch is materialized.
    pub fn release(&mut self, batch: Batch) {
        let mut rows = batch.into_rows();
        rows.clear();
        if self.spare.as_ref().is_none_or(|spare| spare.capacity() < rows.capacity()) {
            self.spare = Some(rows);
        }
    }
}

impl Iterator for ChunkSource {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

/// Decodes one record, replacing invalid UTF-8 rather than failing the whole file.
pub(crate) fn decode_record(record: &csv::ByteRecord) -> Row {
    Row::new(
        record
            .iter()
            .map(|field| Value::from_field(&String::from_utf8_lossy(field)))
            .collect(),
    )
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
    fn test_batches_respect_capacity() {
        let file = create_temp_csv("a,b\n1,x\n2,y\n3,z\n4,w\n5,v\n");
        let mut source =
            ChunkSource::open(file.path(), ChunkOptions::default().with_batch_capacity(2)).unwrap();

        let sizes: Vec<usize> = source.by_ref().map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(source.rows_read(), 5);
        assert_eq!(source.batches_read(), 3);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let file = create_temp_csv("a\n1\n2\n3\n4\n");
        let source =
            ChunkSource::open(file.path(), ChunkOptions::default().with_batch_capacity(2)).unwrap();
        let batches: Vec<Batch> = source.map(Result::unwrap).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].index, 1);
    }

    #[test]
    fn test_header_only_yields_no_batches() {
        let file = create_temp_csv("a,b\n");
        let mut source = ChunkSource::open(file.path(), ChunkOptions::default()).unwrap();
        assert!(source.next_batch().unwrap().is_none());
        assert_eq!(source.schema().columns(), &["a", "b"]);
    }

    #[test]
    fn test_empty_file_is_missing_header() {
        let file = create_temp_csv("");
        let result = ChunkSource::open(file.path(), ChunkOptions::default());
        assert!(matches!(result, Err(IngestError::MissingHeader { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = ChunkSource::open("/definitely/not/here.csv", ChunkOptions::default());
        assert!(matches!(result, Err(IngestError::FileNotFound { .. })));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let file = create_temp_csv("a\n1\n");
        let result = ChunkSource::open(file.path(), ChunkOptions::default().with_batch_capacity(0));
        assert!(matches!(result, Err(IngestError::InvalidOptions { .. })));
    }

    #[test]
    fn test_empty_fields_are_missing() {
        let file = create_temp_csv("a,b\n,x\n");
        let mut source = ChunkSource::open(file.path(), ChunkOptions::default()).unwrap();
        let batch = source.next_batch().unwrap().unwrap();
        assert_eq!(
            batch.rows()[0].values(),
            &[Value::Missing, Value::text("x")]
        );
    }

    #[test]
    fn test_ragged_row_is_csv_error() {
        let file = create_temp_csv("a,b\n1,2\n3\n");
        let mut source = ChunkSource::open(file.path(), ChunkOptions::default()).unwrap();
        let result = source.next_batch();
        assert!(matches!(result, Err(IngestError::Csv { .. })));
    }

    #[test]
    fn test_release_recycles_buffer() {
        let file = create_temp_csv("a\n1\n2\n3\n");
        let mut source =
            ChunkSource::open(file.path(), ChunkOptions::default().with_batch_capacity(2)).unwrap();
        let first = source.next_batch().unwrap().unwrap();
        source.release(first);
        assert!(source.spare.is_some());
        let second = source.next_batch().unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second.rows()[0].values(), &[Value::text("3")]);
    }
}
