//! Eviction Planner Module
//!
//! Chooses the cold tail of the ledger to reclaim under memory pressure.

use crate::cache::Metadata;

/// Fraction of the max heap size at which eviction starts
pub const HEAP_THRESHOLD_RATIO: f64 = 0.8;

/// Fraction of the heap threshold reclaimed per reduction pass
pub const REDUCTION_RATIO: f64 = 0.2;

/// Bytes a single reduction pass tries to reclaim for `max_heap_size`.
///
/// Computed from the unrounded threshold, so `16` gives `round(12.8 * 0.2)`.
pub fn reduction_target(max_heap_size: u64) -> u64 {
    (max_heap_size as f64 * HEAP_THRESHOLD_RATIO * REDUCTION_RATIO).round() as u64
}

// == Heap Limit ==
/// When to reduce and how much to reclaim, derived from a byte ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapLimit {
    /// Integer part of 80% of the ceiling. For whole byte counts
    /// `used > threshold` matches `used > 0.8 * max` exactly.
    pub threshold: u64,
    /// Bytes a reduction pass must exceed
    pub reduction_target: u64,
}

impl HeapLimit {
    pub fn for_max_heap_size(max_heap_size: u64) -> Self {
        Self {
            threshold: (max_heap_size as f64 * HEAP_THRESHOLD_RATIO) as u64,
            reduction_target: reduction_target(max_heap_size),
        }
    }

    pub fn is_exceeded(&self, used_heap_size: u64) -> bool {
        used_heap_size > self.threshold
    }
}

// == Select Victim Chunk ==
/// Returns the start index of the victim chunk `records[index..]`.
///
/// Walks the ranked records from the tail, accumulating sizes, and stops at
/// the first index where the accumulated size exceeds the reduction target.
/// Returns None when no suffix is large enough; in that case nothing is
/// evicted this pass, even if the ledger is over threshold.
pub fn select_victim_chunk(records: &[Metadata], target: u64) -> Option<usize> {
    let mut chunk_size: u64 = 0;

    for (index, record) in records.iter().enumerate().rev() {
        chunk_size = chunk_size.saturating_add(record.size);
        if chunk_size > target {
            return Some(index);
        }
    }

    None
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::freshness::Freshness;

    fn records(sizes: &[u64]) -> Vec<Metadata> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| Metadata::new(format!("key{}", i), *size, Freshness::default()))
            .collect()
    }

    #[test]
    fn test_reduction_target_rounds() {
        assert_eq!(reduction_target(100), 16);
        assert_eq!(reduction_target(1000), 160);
        assert_eq!(reduction_target(0), 0);
    }

    #[test]
    fn test_reduction_target_uses_unrounded_threshold() {
        // 0.8 * 16 = 12.8, round(12.8 * 0.2) = 3
        let limit = HeapLimit::for_max_heap_size(16);
        assert_eq!(limit.threshold, 12);
        assert_eq!(limit.reduction_target, 3);

        // 0.8 * 17 = 13.6, round(13.6 * 0.2) = 3
        assert_eq!(reduction_target(17), 3);
        // 0.8 * 13 = 10.4, round(10.4 * 0.2) = 2
        assert_eq!(reduction_target(13), 2);
    }

    #[test]
    fn test_heap_limit_exceeded_above_fractional_threshold() {
        let limit = HeapLimit::for_max_heap_size(16);
        assert!(!limit.is_exceeded(12));
        assert!(limit.is_exceeded(13));
    }

    #[test]
    fn test_selects_only_tail_when_it_suffices() {
        let records = records(&[10, 10, 10]);
        assert_eq!(select_victim_chunk(&records, 3), Some(2));
    }

    #[test]
    fn test_larger_target_takes_longer_chunk() {
        let records = records(&[5, 3, 2, 2]);
        assert_eq!(select_victim_chunk(&records, 3), Some(2));
        assert_eq!(select_victim_chunk(&records, 4), Some(1));
    }

    #[test]
    fn test_accumulates_across_tail() {
        let records = records(&[50, 8, 7, 6]);
        assert_eq!(select_victim_chunk(&records, 20), Some(1));
    }

    #[test]
    fn test_whole_ledger_can_be_selected() {
        let records = records(&[30, 1]);
        assert_eq!(select_victim_chunk(&records, 20), Some(0));
    }

    #[test]
    fn test_no_chunk_when_target_unreachable() {
        let records = records(&[1, 1, 1]);
        assert_eq!(select_victim_chunk(&records, 20), None);
        assert_eq!(select_victim_chunk(&[], 20), None);
    }

    #[test]
    fn test_accumulated_size_must_exceed_target() {
        // the last two entries sum to exactly 20
        assert_eq!(select_victim_chunk(&records(&[5, 10, 10]), 20), Some(0));
        assert_eq!(select_victim_chunk(&records(&[10, 10]), 20), None);
    }
}
