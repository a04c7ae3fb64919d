//! Exact-duplicate row removal.
//!
//! Two rows are duplicates iff every cell compares equal, including how the
//! cell is missing. Rows are compared through a SHA-256 digest of their
//! cells, so the seen-set costs 32 bytes per distinct row.
//!
//! The default scope is the batch: duplicates that straddle a batch boundary
//! survive. Callers that need file-wide deduplication use
//! [`Deduplicator::global`], which keeps digests across batches.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use batchprep_model::{Batch, Row, Value};

/// Which rows a duplicate is detected against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeScope {
    /// Only rows of the same batch. Misses duplicates across batch boundaries.
    #[default]
    Batch,
    /// Every row seen so far in the processing unit.
    Global,
}

/// Content digest of one row.
pub type RowDigest = [u8; 32];

/// Removes exact-duplicate rows, keeping the first occurrence.
#[derive(Debug, Default)]
pub struct Deduplicator {
    scope: DedupeScope,
    seen: HashSet<RowDigest>,
}

impl Deduplicator {
    pub fn new(scope: DedupeScope) -> Self {
        Self {
            scope,
            seen: HashSet::new(),
        }
    }

    /// Batch-local deduplication.
    pub fn batch_local() -> Self {
        Self::new(DedupeScope::Batch)
    }

    /// Deduplication across every batch passed to this instance.
    pub fn global() -> Self {
        Self::new(DedupeScope::Global)
    }

    pub fn scope(&self) -> DedupeScope {
        self.scope
    }

    /// Number of distinct rows currently remembered.
    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Removes duplicates from `batch` in place and returns how many were dropped.
    pub fn dedupe(&mut self, batch: &mut Batch) -> usize {
        let seen = &mut self.seen;
        let dropped = batch.retain_rows(|row| seen.insert(row_digest(row)));
        if self.scope == DedupeScope::Batch {
            self.seen.clear();
        }
        if dropped > 0 {
            tracing::debug!(batch = batch.index, dropped, "Removed duplicate rows");
        }
        dropped
    }
}

/// Hashes a row so that distinct cell sequences never share an encoding.
///
/// Each cell is tagged by kind and length-prefixed: `["a,b"]` and `["a", "b"]`
/// differ, and a missing cell differs from empty text.
pub fn row_digest(row: &Row) -> RowDigest {
    let mut hasher = Sha256::new();
    hasher.update((row.len() as u64).to_le_bytes());
    for value in row.values() {
        match value {
            Value::Missing => hasher.update([0u8]),
            Value::Text(text) => {
                hasher.update([1u8]);
                hasher.update((text.len() as u64).to_le_bytes());
                hasher.update(text.as_bytes());
            }
            Value::Number(number) => {
                hasher.update([2u8]);
                hasher.update(number.to_bits().to_le_bytes());
            }
        }
    }
    hasher.finalize().into()
}
