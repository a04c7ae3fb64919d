//! CLI library components for batchprep.

pub mod logging;
pub mod summary;
