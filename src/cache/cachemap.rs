//! Cachemap Facade Module
//!
//! Orchestrates storage I/O, freshness evaluation, the metadata ledger and
//! heap-driven eviction.
//!
//! # Concurrency
//! A [`Cachemap`] is a cheap handle that can be cloned across tasks. Every
//! ledger mutation, together with the storage write it accounts for and the
//! threshold check that follows, runs under one async mutex, so concurrent
//! callers cannot lose updates or start duplicate reductions. Reads of the
//! store itself (`get`, `has`) do not take the lock.
//!
//! Reductions are fire-and-forget: the triggering call returns before the
//! reaper finishes culling, and a key written while its victim chunk is in
//! flight may still be culled.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::cache::{
    select_victim_chunk, CacheStats, ExportOptions, ExportResult, HasOptions, HeapLimit,
    ImportOptions, KeyOptions, Ledger, Metadata, SetOptions,
};
use crate::config::{CachemapOptions, ExecutionContext};
use crate::error::{CacheError, Lookup, Result, ValidationError};
use crate::freshness::Freshness;
use crate::keys::{effective_key, estimate_size, validate_key};
use crate::store::{create_store, BackendKind, Store};
use crate::tasks::{Reaper, ReaperCallbacks, ReaperPolicy};

// == Cachemap ==
/// Caching facade over a pluggable storage backend.
#[derive(Clone)]
pub struct Cachemap {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    backend: BackendKind,
    store: Box<dyn Store>,
    state: Mutex<State>,
    max_heap_size: Option<u64>,
    heap_limit: Option<HeapLimit>,
    disable_cache_invalidation: bool,
    execution_context: ExecutionContext,
    /// Set while a reduction's victim chunk is being culled, by the facade
    /// or by a reaper sweep
    reducing: AtomicBool,
    reaper: Reaper,
}

impl Inner {
    fn try_begin_reduction(&self) -> bool {
        !self.reducing.swap(true, Ordering::AcqRel)
    }

    fn end_reduction(&self) {
        self.reducing.store(false, Ordering::Release);
    }
}

struct State {
    ledger: Ledger,
    stats: CacheStats,
}

/// Reaper's view of the facade; holds no strong reference.
struct FacadeCallbacks {
    inner: Weak<Inner>,
}

#[async_trait]
impl ReaperCallbacks for FacadeCallbacks {
    async fn delete(&self, key: &str) -> Result<bool> {
        match self.inner.upgrade() {
            Some(inner) => Cachemap { inner }.evict(key).await,
            None => Ok(false),
        }
    }

    async fn metadata(&self) -> Vec<Metadata> {
        match self.inner.upgrade() {
            Some(inner) => inner.state.lock().await.ledger.entries().to_vec(),
            None => Vec::new(),
        }
    }

    fn try_begin_reduction(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.try_begin_reduction())
    }

    fn end_reduction(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.end_reduction();
        }
    }
}

impl Cachemap {
    // == Constructors ==
    /// Creates a cachemap on the backend selected in `options`.
    ///
    /// Persistent backends restore the ledger from their metadata backup.
    pub async fn create(options: CachemapOptions) -> Result<Self> {
        CacheError::check(options.validate())?;
        let store = create_store(&options).await?;
        Self::with_store(options, store).await
    }

    /// Creates a cachemap on an already constructed store.
    ///
    /// `options.backend` still decides the default heap size and whether the
    /// ledger is backed up.
    pub async fn with_store(options: CachemapOptions, store: Box<dyn Store>) -> Result<Self> {
        CacheError::check(options.validate())?;

        let max_heap_size = options.resolved_max_heap_size();
        let heap_limit = options.heap_limit();
        let policy = ReaperPolicy {
            heap_limit,
            cull_expired: !options.disable_cache_invalidation,
        };

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let callbacks = Arc::new(FacadeCallbacks {
                inner: weak.clone(),
            });

            Inner {
                name: options.name.clone(),
                backend: options.backend,
                store,
                state: Mutex::new(State {
                    ledger: Ledger::new(options.sort_comparator.clone().unwrap_or_default()),
                    stats: CacheStats::new(),
                }),
                max_heap_size,
                heap_limit,
                disable_cache_invalidation: options.disable_cache_invalidation,
                execution_context: options.execution_context,
                reducing: AtomicBool::new(false),
                reaper: Reaper::new(callbacks, &options.reaper, policy),
            }
        });

        let cachemap = Self { inner };
        cachemap.restore_metadata().await;

        info!(
            "Cachemap '{}' created on {} backend (max heap size: {})",
            cachemap.inner.name,
            cachemap.inner.backend,
            describe_limit(max_heap_size)
        );
        Ok(cachemap)
    }

    // == Get ==
    /// Retrieves the value stored under `key` and records the access.
    ///
    /// Storage faults are absorbed into [`Lookup::Degraded`]. A stored
    /// falsy value (`null`, `false`, `0`, `""`) reads as missing and leaves
    /// the ledger untouched.
    pub async fn get(&self, key: &str, options: KeyOptions) -> Result<Lookup<Value>> {
        let key = self.resolve_key(key, options.hash)?;

        let value = match self.inner.store.get(&key).await {
            Ok(Some(value)) if !is_falsy(&value) => value,
            Ok(_) => {
                self.state().await.stats.record_miss();
                return Ok(Lookup::Missing);
            }
            Err(err) => {
                warn!("Read of '{}' degraded to a miss: {}", key, err);
                self.state().await.stats.record_miss();
                return Ok(Lookup::Degraded(err));
            }
        };

        let mut state = self.state().await;
        state.stats.record_hit();
        state.ledger.update(&key, None, None);
        self.commit(state).await;

        Ok(Lookup::Found(value))
    }

    // == Set ==
    /// Stores `value` under `key` with freshness derived from the headers.
    ///
    /// Returns false without touching storage when the response must not be
    /// stored: `no-store`, or `private` in a server context. Storage faults
    /// propagate.
    pub async fn set(&self, key: &str, value: Value, options: SetOptions) -> Result<bool> {
        let key = self.resolve_key(key, options.hash)?;
        let freshness = Freshness::parse(&options.cache_headers.unwrap_or_default());

        if !self.is_storable(&freshness) {
            debug!("Skipping '{}': response is not storable", key);
            return Ok(false);
        }

        let size = estimate_size(&value);
        let mut state = self.state().await;
        self.inner.store.set(&key, value).await?;

        if state.ledger.find(&key).is_some() {
            state.ledger.update(&key, Some(size), Some(freshness));
        } else {
            state.ledger.add(&key, size, freshness);
        }
        debug!("Stored '{}' ({} bytes)", key, size);

        self.commit(state).await;
        Ok(true)
    }

    // == Has ==
    /// Returns the freshness of `key` if it is stored.
    ///
    /// With `delete_expired`, an expired (or untracked) entry is deleted and
    /// reported missing. Storage faults are absorbed into
    /// [`Lookup::Degraded`].
    pub async fn has(&self, key: &str, options: HasOptions) -> Result<Lookup<Freshness>> {
        let key = self.resolve_key(key, options.hash)?;

        match self.inner.store.has(&key).await {
            Ok(true) => {}
            Ok(false) => return Ok(Lookup::Missing),
            Err(err) => {
                warn!("Existence check of '{}' degraded to a miss: {}", key, err);
                return Ok(Lookup::Degraded(err));
            }
        }

        let freshness = self
            .state()
            .await
            .ledger
            .find(&key)
            .map(|record| record.freshness.clone());

        if options.delete_expired && !self.is_fresh(freshness.as_ref()) {
            debug!("Deleting expired '{}'", key);
            return match self.delete_resolved(&key).await {
                Ok(_) => Ok(Lookup::Missing),
                Err(CacheError::Store(err)) => Ok(Lookup::Degraded(err)),
                Err(err) => Err(err),
            };
        }

        Ok(freshness.map_or(Lookup::Missing, Lookup::Found))
    }

    // == Delete ==
    /// Deletes `key`, returning whether it was stored. Storage faults
    /// propagate and leave the ledger untouched.
    pub async fn delete(&self, key: &str, options: KeyOptions) -> Result<bool> {
        let key = self.resolve_key(key, options.hash)?;
        self.delete_resolved(&key).await
    }

    // == Clear ==
    /// Removes every entry from storage and the ledger.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state().await;
        self.inner.store.clear().await?;
        state.ledger.clear();
        self.commit(state).await;

        info!("Cachemap '{}' cleared", self.inner.name);
        Ok(())
    }

    // == Size ==
    /// Number of managed entries in storage.
    ///
    /// The metadata backup entry is never counted.
    pub async fn size(&self) -> Result<usize> {
        let count = self.inner.store.size().await?;

        if self.inner.backend.persists_metadata()
            && self.inner.store.has(&self.backup_key()).await?
        {
            Ok(count.saturating_sub(1))
        } else {
            Ok(count)
        }
    }

    // == Entries ==
    /// Managed key/value pairs sorted by key, optionally limited to `keys`
    /// (effective keys).
    pub async fn entries(&self, keys: Option<&[String]>) -> Result<Vec<(String, Value)>> {
        let backup_key = self.backup_key();
        let mut entries: Vec<(String, Value)> = self
            .inner
            .store
            .entries()
            .await?
            .into_iter()
            .filter(|(key, _)| *key != backup_key)
            .filter(|(key, _)| keys.map_or(true, |keys| keys.contains(key)))
            .collect();

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    // == Export ==
    /// Exports values together with their metadata records.
    pub async fn export(&self, options: ExportOptions) -> Result<ExportResult> {
        let entries = self.entries(options.keys.as_deref()).await?;
        let state = self.state().await;

        let metadata = state
            .ledger
            .entries()
            .iter()
            .filter(|record| entries.iter().any(|(key, _)| *key == record.key))
            .cloned()
            .collect();

        Ok(ExportResult { entries, metadata })
    }

    // == Import ==
    /// Writes exported entries and adopts their metadata records.
    ///
    /// Records without a matching entry are ignored; entries without a
    /// record are tracked as new.
    pub async fn import(&self, options: ImportOptions) -> Result<()> {
        let ImportOptions { entries, metadata } = options;

        let mut errors = Vec::new();
        for (key, _) in &entries {
            self.validate_key(key, &mut errors);
        }
        CacheError::check(errors)?;

        let mut state = self.state().await;
        let mut imported = Vec::with_capacity(entries.len());

        for (key, value) in entries {
            let size = estimate_size(&value);
            self.inner.store.set(&key, value).await?;
            imported.push((key, size));
        }

        let mut adopted = HashSet::new();
        for record in metadata {
            if imported.iter().any(|(key, _)| *key == record.key) {
                adopted.insert(record.key.clone());
                state.ledger.upsert(record);
            }
        }
        for (key, size) in &imported {
            if adopted.contains(key) {
                continue;
            }
            if !state.ledger.update(key, Some(*size), None) {
                state.ledger.add(key, *size, Freshness::default());
            }
        }

        info!("Imported {} entries into '{}'", imported.len(), self.inner.name);
        self.commit(state).await;
        Ok(())
    }

    // == Accessors ==
    /// Ledger records in ranking order.
    pub async fn metadata(&self) -> Vec<Metadata> {
        self.state().await.ledger.entries().to_vec()
    }

    pub async fn used_heap_size(&self) -> u64 {
        self.state().await.ledger.used_heap_size()
    }

    /// Ledger records and heap usage read together.
    pub async fn snapshot(&self) -> (Vec<Metadata>, u64) {
        let state = self.state().await;
        (state.ledger.entries().to_vec(), state.ledger.used_heap_size())
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state().await;
        let mut stats = state
            .stats
            .clone()
            .with_ledger(state.ledger.len(), state.ledger.used_heap_size());
        stats.max_heap_size = self.inner.max_heap_size;
        stats
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn backend(&self) -> BackendKind {
        self.inner.backend
    }

    pub fn max_heap_size(&self) -> Option<u64> {
        self.inner.max_heap_size
    }

    pub fn max_heap_threshold(&self) -> Option<u64> {
        self.inner.heap_limit.map(|limit| limit.threshold)
    }

    pub fn reaper(&self) -> &Reaper {
        &self.inner.reaper
    }

    // == Internals ==
    async fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().await
    }

    fn backup_key(&self) -> String {
        format!("{} metadata", self.inner.name)
    }

    fn validate_key(&self, key: &str, errors: &mut Vec<ValidationError>) {
        validate_key(key, errors);
        if key == self.backup_key() {
            errors.push(ValidationError::ReservedKey(key.to_string()));
        }
    }

    fn resolve_key(&self, key: &str, hash: bool) -> Result<String> {
        let mut errors = Vec::new();
        self.validate_key(key, &mut errors);
        CacheError::check(errors)?;
        Ok(effective_key(key, hash))
    }

    fn is_storable(&self, freshness: &Freshness) -> bool {
        let control = &freshness.cache_control;
        let private_on_server =
            control.private && self.inner.execution_context == ExecutionContext::Server;
        !(control.no_store || private_on_server)
    }

    fn is_fresh(&self, freshness: Option<&Freshness>) -> bool {
        self.inner.disable_cache_invalidation || freshness.is_some_and(Freshness::check_ttl)
    }

    async fn delete_resolved(&self, key: &str) -> Result<bool> {
        let mut state = self.state().await;
        if !self.inner.store.delete(key).await? {
            return Ok(false);
        }

        state.ledger.remove(key);
        self.commit(state).await;
        Ok(true)
    }

    /// Deletion requested by the reaper; counted as an eviction.
    async fn evict(&self, key: &str) -> Result<bool> {
        let deleted = self.delete_resolved(key).await?;
        if deleted {
            self.state().await.stats.record_eviction();
        }
        Ok(deleted)
    }

    /// Finishes a ledger mutation: backs the ledger up and starts a reduction
    /// if the heap threshold is exceeded. Releases the state lock.
    async fn commit(&self, state: MutexGuard<'_, State>) {
        self.backup_metadata(&state.ledger).await;
        let victims = self.plan_reduction(&state.ledger);
        drop(state);

        if let Some(victims) = victims {
            self.schedule_reduction(victims);
        }
    }

    fn plan_reduction(&self, ledger: &Ledger) -> Option<Vec<Metadata>> {
        let limit = self.inner.heap_limit?;
        if !limit.is_exceeded(ledger.used_heap_size()) {
            return None;
        }

        if !self.inner.try_begin_reduction() {
            debug!("Heap threshold exceeded, reduction already in flight");
            return None;
        }

        match select_victim_chunk(ledger.entries(), limit.reduction_target) {
            Some(index) => Some(ledger.entries()[index..].to_vec()),
            None => {
                self.inner.end_reduction();
                debug!("Heap threshold exceeded but no victim chunk reaches the target");
                None
            }
        }
    }

    fn schedule_reduction(&self, victims: Vec<Metadata>) {
        info!(
            "Heap threshold exceeded in '{}', culling {} entries",
            self.inner.name,
            victims.len()
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let culled = inner.reaper.cull(victims).await;
            inner.end_reduction();
            debug!("Reduction culled {} entries", culled);
        });
    }

    async fn backup_metadata(&self, ledger: &Ledger) {
        if !self.inner.backend.persists_metadata() {
            return;
        }

        let snapshot = match serde_json::to_value(ledger.entries()) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("Failed to encode metadata backup: {}", err);
                return;
            }
        };

        if let Err(err) = self.inner.store.set(&self.backup_key(), snapshot).await {
            warn!("Failed to back up metadata for '{}': {}", self.inner.name, err);
        }
    }

    async fn restore_metadata(&self) {
        if !self.inner.backend.persists_metadata() {
            return;
        }

        let records = match self.inner.store.get(&self.backup_key()).await {
            Ok(Some(value)) => match serde_json::from_value::<Vec<Metadata>>(value) {
                Ok(records) => records,
                Err(err) => {
                    warn!("Ignoring unreadable metadata backup: {}", err);
                    return;
                }
            },
            Ok(None) => return,
            Err(err) => {
                warn!("Failed to read metadata backup: {}", err);
                return;
            }
        };

        let mut state = self.state().await;
        state.ledger.replace(records);
        info!(
            "Restored {} metadata records for '{}'",
            state.ledger.len(),
            self.inner.name
        );

        let victims = self.plan_reduction(&state.ledger);
        drop(state);
        if let Some(victims) = victims {
            self.schedule_reduction(victims);
        }
    }
}

/// Values a read treats as absent.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn describe_limit(limit: Option<u64>) -> String {
    match limit {
        Some(bytes) => format!("{} bytes", bytes),
        None => "unbounded".to_string(),
    }
}
