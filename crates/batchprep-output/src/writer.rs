//! Single-destination batch writer.
//!
//! Each batch is serialized into memory first and then written with one
//! `write_all`. If that write fails, the file is truncated back to its length
//! before the batch, so an interrupted run leaves only whole batches behind.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use batchprep_model::Batch;

use crate::error::{OutputError, Result};

/// How an existing destination file is treated when opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Start from an empty file.
    #[default]
    Truncate,
    /// Keep existing content; a header is written only to a new or empty file.
    Append,
}

/// Ensure a parent directory exists for a file path.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| OutputError::io(parent, e))?;
    }
    Ok(())
}

/// Append-only CSV sink with header-once semantics.
#[derive(Debug)]
pub struct BatchWriter {
    path: PathBuf,
    file: File,
    /// Bytes currently committed to the file.
    len: u64,
    /// Column names fixed by the first write (or the existing header).
    columns: Option<Vec<String>>,
    header_written: bool,
    rows_written: u64,
    batches_written: usize,
    buffer: Vec<u8>,
    record: csv::ByteRecord,
}

impl BatchWriter {
    /// Opens `path`, creating parent directories as needed.
    ///
    /// In [`WriteMode::Append`] a non-empty file counts as already having a
    /// header, and its header row fixes the schema for later writes.
    pub fn create(path: &Path, mode: WriteMode) -> Result<Self> {
        ensure_parent_dir(path)?;
        let file = match mode {
            WriteMode::Truncate => File::create(path),
            WriteMode::Append => OpenOptions::new().create(true).append(true).open(path),
        }
        .map_err(|e| OutputError::io(path, e))?;
        let len = file.metadata().map_err(|e| OutputError::io(path, e))?.len();

        let columns = if len > 0 {
            Some(read_existing_header(path)?)
        } else {
            None
        };

        tracing::debug!(path = %path.display(), ?mode, existing_bytes = len, "Opened output");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            header_written: len > 0,
            columns,
            rows_written: 0,
            batches_written: 0,
            buffer: Vec::new(),
            record: csv::ByteRecord::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    /// Data rows written through this writer.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn batches_written(&self) -> usize {
        self.batches_written
    }

    /// Columns fixed for this destination, once known.
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Writes one batch atomically and returns the number of rows written.
    ///
    /// The header goes out iff `is_first_batch_of_run` is set and the
    /// destination has no header yet. An empty first batch still writes the
    /// header.
    pub fn write(&mut self, batch: &Batch, is_first_batch_of_run: bool) -> Result<usize> {
        let columns = batch.schema().columns();
        if let Some(expected) = &self.columns {
            if expected.as_slice() != columns {
                return Err(OutputError::SchemaChanged {
                    path: self.path.clone(),
                    expected: expected.clone(),
                    found: columns.to_vec(),
                });
            }
        } else {
            self.columns = Some(columns.to_vec());
        }

        let write_header = is_first_batch_of_run && !self.header_written;
        self.serialize(batch, write_header)?;
        if !self.buffer.is_empty() {
            self.commit()?;
        }

        if write_header {
            self.header_written = true;
        }
        self.rows_written += batch.len() as u64;
        self.batches_written += 1;
        Ok(batch.len())
    }

    /// Flushes file contents to disk.
    pub fn finish(self) -> Result<u64> {
        self.file
            .sync_all()
            .map_err(|e| OutputError::io(&self.path, e))?;
        Ok(self.rows_written)
    }

    fn serialize(&mut self, batch: &Batch, write_header: bool) -> Result<()> {
        self.buffer.clear();
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut self.buffer);
        let record = &mut self.record;
        if write_header {
            record.clear();
            for column in batch.schema().columns() {
                record.push_field(column.as_bytes());
            }
            writer
                .write_byte_record(record)
                .map_err(|e| OutputError::csv(&self.path, &e))?;
        }
        for row in batch.rows() {
            record.clear();
            for value in row.values() {
                record.push_field(value.render().as_bytes());
            }
            writer
                .write_byte_record(record)
                .map_err(|e| OutputError::csv(&self.path, &e))?;
        }
        writer.flush().map_err(|e| OutputError::io(&self.path, e))?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let result = self
            .file
            .write_all(&self.buffer)
            .and_then(|()| self.file.flush());
        match result {
            Ok(()) => {
                self.len += self.buffer.len() as u64;
                Ok(())
            }
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "Batch write failed; truncating to last complete batch"
                );
                // The write error is reported; rollback errors are not.
                let _ = self.file.set_len(self.len);
                let _ = self.file.seek(SeekFrom::Start(self.len));
                Err(OutputError::io(&self.path, error))
            }
        }
    }
}

fn read_existing_header(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| OutputError::csv(path, &e))?;
    let header = reader.headers().map_err(|e| OutputError::csv(path, &e))?;
    Ok(header.iter().map(str::to_string).collect())
}
