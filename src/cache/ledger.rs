//! Metadata Ledger Module
//!
//! Ordered index of per-key metadata with aggregate heap accounting.
//!
//! Every mutation re-sorts the records with the configured comparator and
//! recomputes the used heap size, so both are always observable in a
//! consistent state.

use crate::cache::{current_timestamp_ms, Metadata, SortComparator};
use crate::freshness::Freshness;

// == Ledger ==
/// Metadata records kept in ranking order, most valuable first.
#[derive(Debug, Default)]
pub struct Ledger {
    /// Records in comparator order
    records: Vec<Metadata>,
    /// Sum of all record sizes
    used_heap_size: u64,
    /// Ranking policy
    comparator: SortComparator,
}

impl Ledger {
    // == Constructor ==
    /// Creates an empty ledger ordered by `comparator`.
    pub fn new(comparator: SortComparator) -> Self {
        Self {
            records: Vec::new(),
            used_heap_size: 0,
            comparator,
        }
    }

    // == Add ==
    /// Appends a new record for `key`.
    ///
    /// Returns false and leaves the ledger untouched if the key is already
    /// tracked; overwrites go through [`Ledger::update`].
    pub fn add(&mut self, key: &str, size: u64, freshness: Freshness) -> bool {
        if self.position(key).is_some() {
            return false;
        }

        self.records.push(Metadata::new(key, size, freshness));
        self.resync();
        true
    }

    // == Update ==
    /// Records a write (`size` given) or a read (`size` absent) of `key`.
    ///
    /// A write with a different size counts as a fresh entry: the access
    /// count drops to zero and `last_accessed` moves to now. `added` never
    /// changes. Returns false if the key is not tracked.
    pub fn update(&mut self, key: &str, size: Option<u64>, freshness: Option<Freshness>) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };

        let now = current_timestamp_ms();
        let record = &mut self.records[index];

        match size {
            Some(size) => {
                if size != record.size {
                    record.accessed_count = 0;
                    record.last_accessed = now;
                }
                record.size = size;
                record.last_updated = now;
            }
            None => {
                record.accessed_count += 1;
                record.last_accessed = now;
            }
        }

        if let Some(freshness) = freshness {
            record.freshness = freshness;
        }

        self.resync();
        true
    }

    // == Upsert ==
    /// Inserts a complete record, replacing any record with the same key.
    pub fn upsert(&mut self, record: Metadata) {
        match self.position(&record.key) {
            Some(index) => self.records[index] = record,
            None => self.records.push(record),
        }
        self.resync();
    }

    // == Replace ==
    /// Replaces all records, keeping the last record seen for each key.
    pub fn replace(&mut self, records: Vec<Metadata>) {
        self.records.clear();
        for record in records {
            match self.position(&record.key) {
                Some(index) => self.records[index] = record,
                None => self.records.push(record),
            }
        }
        self.resync();
    }

    // == Remove ==
    /// Removes and returns the record for `key`, if tracked.
    pub fn remove(&mut self, key: &str) -> Option<Metadata> {
        let index = self.position(key)?;
        let removed = self.records.remove(index);
        self.resync();
        Some(removed)
    }

    // == Clear ==
    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.used_heap_size = 0;
    }

    // == Find ==
    /// Returns the record for `key`, if tracked.
    pub fn find(&self, key: &str) -> Option<&Metadata> {
        self.records.iter().find(|record| record.key == key)
    }

    /// Records in ranking order.
    pub fn entries(&self) -> &[Metadata] {
        &self.records
    }

    /// Sum of the sizes of all records.
    pub fn used_heap_size(&self) -> u64 {
        self.used_heap_size
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.records.iter().position(|record| record.key == key)
    }

    fn resync(&mut self) {
        let comparator = &self.comparator;
        // sort_by is stable, so equal records keep their relative order
        self.records.sort_by(|a, b| comparator.compare(a, b));
        self.used_heap_size = self.records.iter().map(|record| record.size).sum();
    }
}
