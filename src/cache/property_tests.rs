//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the ledger, planner and facade invariants over
//! random operation sequences.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

use crate::cache::{
    default_comparator, reduction_target, select_victim_chunk, HeapLimit, Cachemap, KeyOptions, Ledger,
    Metadata, SetOptions,
};
use crate::config::CachemapOptions;
use crate::error::Lookup;
use crate::freshness::Freshness;
use crate::keys::estimate_size;

// == Strategies ==
/// Generates valid cache keys from a small pool so operations collide
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}".prop_map(|s| s)
}

/// Generates truthy JSON values of varying shapes
fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-zA-Z0-9 ]{1,64}".prop_map(Value::from),
        any::<i64>().prop_filter("zero reads as missing", |n| *n != 0).prop_map(Value::from),
        Just(Value::Bool(true)),
        prop::collection::vec("[a-z]{0,8}", 0..4).prop_map(|items| json!(items)),
    ]
}

/// Ledger mutations
#[derive(Debug, Clone)]
enum LedgerOp {
    Add { key: String, size: u64 },
    Write { key: String, size: u64 },
    Read { key: String },
    Remove { key: String },
}

fn ledger_op_strategy() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        (key_strategy(), 0..500u64).prop_map(|(key, size)| LedgerOp::Add { key, size }),
        (key_strategy(), 0..500u64).prop_map(|(key, size)| LedgerOp::Write { key, size }),
        key_strategy().prop_map(|key| LedgerOp::Read { key }),
        key_strategy().prop_map(|key| LedgerOp::Remove { key }),
    ]
}

/// Facade operations
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Value },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

fn apply(ledger: &mut Ledger, op: LedgerOp) {
    match op {
        LedgerOp::Add { key, size } => {
            ledger.add(&key, size, Freshness::default());
        }
        LedgerOp::Write { key, size } => {
            ledger.update(&key, Some(size), None);
        }
        LedgerOp::Read { key } => {
            ledger.update(&key, None, None);
        }
        LedgerOp::Remove { key } => {
            ledger.remove(&key);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Heap accounting: used heap size always equals the sum of record sizes,
    // and each key is tracked at most once.
    #[test]
    fn prop_heap_accounting(ops in prop::collection::vec(ledger_op_strategy(), 1..60)) {
        let mut ledger = Ledger::default();

        for op in ops {
            apply(&mut ledger, op);

            let sum: u64 = ledger.entries().iter().map(|r| r.size).sum();
            prop_assert_eq!(ledger.used_heap_size(), sum, "Heap size drifted from records");

            let keys: HashSet<&str> = ledger.entries().iter().map(|r| r.key.as_str()).collect();
            prop_assert_eq!(keys.len(), ledger.len(), "Duplicate key in ledger");
        }
    }

    // Ordering: after every mutation adjacent records never compare Greater.
    #[test]
    fn prop_ledger_stays_sorted(ops in prop::collection::vec(ledger_op_strategy(), 1..60)) {
        let mut ledger = Ledger::default();

        for op in ops {
            apply(&mut ledger, op);

            for pair in ledger.entries().windows(2) {
                prop_assert_ne!(
                    default_comparator(&pair[0], &pair[1]),
                    std::cmp::Ordering::Greater,
                    "Records out of order: {:?}",
                    pair
                );
            }
        }
    }

    // Planner: the chosen chunk is the shortest suffix whose size exceeds
    // the reduction target; None only when even the whole ledger does not.
    #[test]
    fn prop_victim_chunk_is_minimal_suffix(
        sizes in prop::collection::vec(0..200u64, 0..30),
        target in 0..400u64
    ) {
        let records: Vec<Metadata> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| Metadata::new(format!("k{}", i), *size, Freshness::default()))
            .collect();
        let suffix_sum = |from: usize| -> u64 { records[from..].iter().map(|r| r.size).sum() };

        match select_victim_chunk(&records, target) {
            Some(index) => {
                prop_assert!(suffix_sum(index) > target, "Chunk does not reach target");
                prop_assert!(suffix_sum(index + 1) <= target, "Chunk is not minimal");
            }
            None => {
                prop_assert!(suffix_sum(0) <= target, "Missed a qualifying chunk");
            }
        }
    }

    // Heap limit: threshold is floor(0.8 * max) and the target rounds
    // 0.16 * max without truncating the threshold first.
    #[test]
    fn prop_heap_limit_matches_ratios(max in 1..10_000_000u64) {
        let limit = HeapLimit::for_max_heap_size(max);
        prop_assert_eq!(limit.threshold, max * 4 / 5);
        prop_assert_eq!(limit.reduction_target, (max * 16 + 50) / 100);
        prop_assert_eq!(reduction_target(max), limit.reduction_target);
    }

    // Round trip: a stored value reads back unchanged with one recorded access.
    #[test]
    fn prop_roundtrip_storage(key in key_strategy(), value in value_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let cache = Cachemap::create(CachemapOptions::new("prop")).await.unwrap();
            cache.set(&key, value.clone(), SetOptions::default()).await.unwrap();

            let retrieved = cache.get(&key, KeyOptions::default()).await.unwrap();
            prop_assert_eq!(retrieved, Lookup::Found(value.clone()));

            let metadata = cache.metadata().await;
            prop_assert_eq!(metadata.len(), 1);
            prop_assert_eq!(metadata[0].accessed_count, 1);
            prop_assert_eq!(metadata[0].size, estimate_size(&value));
            Ok::<(), TestCaseError>(())
        })?;
    }

    // Statistics: hits and misses match the outcome of every get.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let cache = Cachemap::create(CachemapOptions::new("prop")).await.unwrap();
            let mut expected_hits: u64 = 0;
            let mut expected_misses: u64 = 0;

            for op in ops {
                match op {
                    CacheOp::Set { key, value } => {
                        cache.set(&key, value, SetOptions::default()).await.unwrap();
                    }
                    CacheOp::Get { key } => {
                        match cache.get(&key, KeyOptions::default()).await.unwrap() {
                            Lookup::Found(_) => expected_hits += 1,
                            _ => expected_misses += 1,
                        }
                    }
                    CacheOp::Delete { key } => {
                        cache.delete(&key, KeyOptions::default()).await.unwrap();
                    }
                }
            }

            let stats = cache.stats().await;
            prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
            prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
            prop_assert_eq!(stats.total_entries, cache.size().await.unwrap(), "Total entries mismatch");
            Ok::<(), TestCaseError>(())
        })?;
    }
}

// == Property Test for Concurrent Operation Correctness ==
// Concurrent facade calls must leave storage and ledger in agreement.

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_concurrent_operations_keep_ledger_consistent(
        operations in prop::collection::vec(cache_op_strategy(), 10..50)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let cache = Cachemap::create(CachemapOptions::new("concurrent")).await.unwrap();
            let mut handles = vec![];

            for op in operations {
                let cache = cache.clone();
                handles.push(tokio::spawn(async move {
                    match op {
                        CacheOp::Set { key, value } => {
                            cache.set(&key, value, SetOptions::default()).await.map(|_| ())
                        }
                        CacheOp::Get { key } => {
                            cache.get(&key, KeyOptions::default()).await.map(|_| ())
                        }
                        CacheOp::Delete { key } => {
                            cache.delete(&key, KeyOptions::default()).await.map(|_| ())
                        }
                    }
                }));
            }

            for handle in handles {
                let result = handle.await.expect("Task should not panic");
                prop_assert!(result.is_ok(), "Concurrent operation failed: {:?}", result);
            }

            let stored: HashMap<String, Value> =
                cache.entries(None).await.unwrap().into_iter().collect();
            let (metadata, used_heap_size) = cache.snapshot().await;

            prop_assert_eq!(metadata.len(), stored.len(), "Ledger and storage disagree");
            for record in &metadata {
                let value = stored.get(&record.key);
                prop_assert!(value.is_some(), "Tracked key '{}' missing from storage", record.key);
                prop_assert_eq!(record.size, value.map(estimate_size).unwrap_or_default());
            }
            prop_assert_eq!(used_heap_size, metadata.iter().map(|r| r.size).sum::<u64>());
            Ok::<(), TestCaseError>(())
        })?;
    }
}
