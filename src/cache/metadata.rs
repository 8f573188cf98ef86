//! Metadata Module
//!
//! Defines the per-key bookkeeping record and the ranking used to order it.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::freshness::Freshness;

// == Metadata ==
/// Bookkeeping record for one managed key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Effective (possibly hashed) storage key
    pub key: String,
    /// Estimated value size in bytes
    pub size: u64,
    /// First insertion (Unix milliseconds), never changes
    pub added: u64,
    /// Last successful read (Unix milliseconds)
    pub last_accessed: u64,
    /// Last size-changing write (Unix milliseconds)
    pub last_updated: u64,
    /// Number of reads since the entry was (re)written with a new size
    pub accessed_count: u64,
    /// Cache policy and expiry of the stored value
    pub freshness: Freshness,
}

impl Metadata {
    // == Constructor ==
    /// Creates a record stamped with the current time and no accesses.
    pub fn new(key: impl Into<String>, size: u64, freshness: Freshness) -> Self {
        let now = current_timestamp_ms();
        Self {
            key: key.into(),
            size,
            added: now,
            last_accessed: now,
            last_updated: now,
            accessed_count: 0,
            freshness,
        }
    }

    /// Returns true while the stored value is still fresh.
    pub fn is_fresh(&self) -> bool {
        self.freshness.check_ttl()
    }
}

// == Sort Comparator ==
/// Ranking policy for the ledger; entries that compare `Less` are kept longest.
#[derive(Clone)]
pub struct SortComparator(Arc<dyn Fn(&Metadata, &Metadata) -> Ordering + Send + Sync>);

impl SortComparator {
    pub fn new(f: impl Fn(&Metadata, &Metadata) -> Ordering + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn compare(&self, a: &Metadata, b: &Metadata) -> Ordering {
        (self.0)(a, b)
    }
}

impl Default for SortComparator {
    fn default() -> Self {
        Self::new(default_comparator)
    }
}

impl fmt::Debug for SortComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SortComparator")
    }
}

/// Default ranking: most accessed, then most recently accessed, updated and
/// added first; equal records put the smaller entry first.
pub fn default_comparator(a: &Metadata, b: &Metadata) -> Ordering {
    b.accessed_count
        .cmp(&a.accessed_count)
        .then_with(|| b.last_accessed.cmp(&a.last_accessed))
        .then_with(|| b.last_updated.cmp(&a.last_updated))
        .then_with(|| b.added.cmp(&a.added))
        .then_with(|| a.size.cmp(&b.size))
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
