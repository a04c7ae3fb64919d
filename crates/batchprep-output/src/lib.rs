//! Output sinks for the batchprep pipeline.
//!
//! - [`BatchWriter`]: one CSV destination, header written once, each batch
//!   committed with a single write and rolled back on failure
//! - [`FanoutWriter`]: rows routed to one destination per partition value,
//!   created lazily and capped in open handles
//! - [`write_mapping_table`] / [`read_mapping_table`]: the per-unit encoding
//!   mapping table

mod error;
mod fanout;
mod mapping;
mod writer;

pub use error::{OutputError, Result};
pub use fanout::{
    DEFAULT_MAX_OPEN_FILES, DestinationSummary, FanoutWriter, MISSING_PARTITION_KEY,
    sanitize_destination_key,
};
pub use mapping::{MAPPING_HEADER, read_mapping_table, write_mapping_table};
pub use writer::{BatchWriter, WriteMode};
