//! Cache Module
//!
//! The cachemap facade with its metadata ledger, eviction planner and
//! statistics.

mod cachemap;
mod ledger;
mod metadata;
mod options;
mod planner;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use cachemap::Cachemap;
pub use ledger::Ledger;
pub use metadata::{current_timestamp_ms, default_comparator, Metadata, SortComparator};
pub use options::{
    ExportOptions, ExportResult, HasOptions, ImportOptions, KeyOptions, SetOptions,
};
pub use planner::{
    reduction_target, select_victim_chunk, HeapLimit, HEAP_THRESHOLD_RATIO, REDUCTION_RATIO,
};
pub use stats::CacheStats;
