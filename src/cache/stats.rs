//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! heap usage.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed or degraded cache retrievals
    pub misses: u64,
    /// Number of entries culled by the reaper
    pub evictions: u64,
    /// Current number of tracked entries
    pub total_entries: usize,
    /// Sum of tracked entry sizes in bytes
    pub used_heap_size: u64,
    /// Byte ceiling, None when unbounded
    pub max_heap_size: Option<u64>,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Snapshot Fields ==
    /// Fills in the ledger-derived fields.
    pub fn with_ledger(mut self, total_entries: usize, used_heap_size: u64) -> Self {
        self.total_entries = total_entries;
        self.used_heap_size = used_heap_size;
        self
    }
}
