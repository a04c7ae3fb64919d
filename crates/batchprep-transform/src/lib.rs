//! Batch transforms for the batchprep pipeline.
//!
//! Every transform works on one [`batchprep_model::Batch`] at a time and
//! mutates it in place. Cross-batch state is explicit and owned by the
//! caller:
//!
//! - [`Deduplicator`] keeps a digest seen-set only in [`DedupeScope::Global`]
//! - [`CategoricalEncoder`] keeps one [`EncodingMap`] per column for the
//!   lifetime of a processing unit
//! - [`ReferenceIndex`] is built once and shared read-only by [`EnrichJoin`]
//! - [`StatisticsAccumulator`] folds batches into [`ColumnStatistics`] that
//!   the stateless [`Imputer`] then applies
//!
//! A configured column that is absent from a batch never fails a transform;
//! the column is skipped and a [`SchemaWarning`] is returned.

mod columns;
mod dedupe;
mod encode;
mod error;
mod fill;
mod filter;
mod impute;
mod reference;
mod statistics;
mod warning;

pub use columns::ColumnDropper;
pub use dedupe::{DedupeScope, Deduplicator, RowDigest, row_digest};
pub use encode::{
    CategoricalEncoder, DEFAULT_SENTINEL_TOKEN, EncodeOutcome, EncodingMap, MappingEntry,
    MappingTable,
};
pub use error::{Result, TransformError};
pub use fill::{FillPolicy, MissingFiller, NameRule, default_name_rules};
pub use filter::{FilterOutcome, RowFilter};
pub use impute::{ImputeOutcome, Imputer};
pub use reference::{EnrichJoin, EnrichOutcome, ReferenceIndex};
pub use statistics::{
    ColumnStatistics, ImputeColumn, ImputeStrategy, StatisticsAccumulator, StatisticsScope,
};
pub use warning::SchemaWarning;
