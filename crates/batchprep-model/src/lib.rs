//! Core data model for the batchprep pipeline.
//!
//! Every other crate in the workspace exchanges data through these types:
//!
//! - [`Value`]: one cell (text, number, or missing)
//! - [`Row`] / [`Schema`]: positionally aligned records and their column names
//! - [`Batch`]: a bounded, contiguous slice of a source dataset
//! - [`Sentinel`] / [`ColumnStatistic`]: what "missing" means for a column and
//!   what replaces it

mod batch;
mod error;
mod statistic;
mod value;

pub use batch::{Batch, Row, Schema};
pub use error::{ModelError, Result};
pub use statistic::{ColumnStatistic, Sentinel};
pub use value::{Value, format_numeric, parse_f64};
