//! Batch ingestion for the batchprep pipeline.
//!
//! # Features
//!
//! - **Streaming batches**: [`ChunkSource`] reads a CSV in bounded batches and
//!   recycles row buffers between them
//! - **Reference tables**: [`load_reference_table`] loads a small lookup table
//!   whole, with an explicit degraded fallback when the full read fails
//! - **Headers**: BOM stripping and whitespace normalization of column names
//!
//! # Example
//!
//! ```ignore
//! use batchprep_ingest::{ChunkOptions, ChunkSource};
//!
//! let mut source = ChunkSource::open("registrations.csv", ChunkOptions::default())?;
//! while let Some(batch) = source.next_batch()? {
//!     println!("batch {} has {} rows", batch.index, batch.len());
//!     source.release(batch);
//! }
//! ```

mod error;
mod header;
mod polars_utils;
mod reference;
mod source;

// === Error Types ===
pub use error::{IngestError, Result};

// === Batch Reading ===
pub use source::{ChunkOptions, ChunkSource, DEFAULT_BATCH_CAPACITY};

// === Headers ===
pub use header::{normalize_header, read_csv_header};

// === Reference Tables ===
pub use reference::{
    DEFAULT_FALLBACK_ROW_LIMIT, LoadCompleteness, ReferenceLoadOptions, ReferenceTable,
    load_reference_table,
};

// === Polars Helpers ===
pub use polars_utils::any_to_value;
