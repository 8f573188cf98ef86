//! Reaper Task
//!
//! Best-effort culling of victim entries, on demand or on a timer.
//!
//! The reaper never touches storage or the ledger itself. It reads ledger
//! snapshots and requests deletions through [`ReaperCallbacks`], which the
//! facade implements, so all writes still go through the facade.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{select_victim_chunk, HeapLimit, Metadata};
use crate::error::Result;

/// Default interval between periodic sweeps
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(300);

// == Callbacks ==
/// View of the facade handed to the reaper.
#[async_trait]
pub trait ReaperCallbacks: Send + Sync {
    /// Deletes `key` from storage and ledger, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Current ledger snapshot in ranking order.
    async fn metadata(&self) -> Vec<Metadata>;

    /// Claims the single reduction slot. Returns false while another
    /// reduction is in flight.
    fn try_begin_reduction(&self) -> bool;

    /// Releases the slot claimed by [`try_begin_reduction`](Self::try_begin_reduction).
    fn end_reduction(&self);
}

// == Options ==
/// Periodic mode settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaperOptions {
    /// Time between sweeps
    #[serde(rename = "intervalMs", with = "duration_ms")]
    pub interval: Duration,
    /// Start sweeping as soon as the reaper is created
    pub start: bool,
}

impl Default for ReaperOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REAPER_INTERVAL,
            start: false,
        }
    }
}

/// What a periodic sweep is allowed to reclaim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaperPolicy {
    /// Heap threshold and reduction target, None when the backend is unbounded
    pub heap_limit: Option<HeapLimit>,
    /// Whether entries past their TTL are culled
    pub cull_expired: bool,
}

// == Reaper ==
/// Culls victim entries through the facade's callbacks.
///
/// States: stopped, running. `start` on a running reaper and `stop` on a
/// stopped one are no-ops. Dropping the reaper stops it.
pub struct Reaper {
    callbacks: Arc<dyn ReaperCallbacks>,
    interval: Duration,
    policy: ReaperPolicy,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Reaper {
    // == Constructor ==
    /// Creates a reaper, starting periodic mode if `options.start` is set.
    pub fn new(
        callbacks: Arc<dyn ReaperCallbacks>,
        options: &ReaperOptions,
        policy: ReaperPolicy,
    ) -> Self {
        let reaper = Self {
            callbacks,
            interval: options.interval,
            policy,
            task: Mutex::new(None),
        };

        if options.start {
            reaper.start();
        }

        reaper
    }

    // == Cull ==
    /// Deletes every record's key, continuing past individual failures.
    ///
    /// Returns the number of keys actually removed. A failed deletion leaves
    /// the record in place for a later pass.
    pub async fn cull(&self, records: Vec<Metadata>) -> usize {
        cull_records(self.callbacks.as_ref(), &records).await
    }

    // == Sweep ==
    /// Runs one periodic pass: expired entries, then the cold tail if the
    /// remaining entries are still over threshold.
    pub async fn sweep(&self) -> usize {
        sweep(self.callbacks.as_ref(), &self.policy).await
    }

    // == Start ==
    /// Starts periodic sweeping on the current tokio runtime.
    pub fn start(&self) {
        let mut task = self.task();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Reaper already running");
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("Reaper not started: no tokio runtime available");
            return;
        };

        let callbacks = Arc::clone(&self.callbacks);
        let policy = self.policy.clone();
        let interval = self.interval;

        *task = Some(runtime.spawn(async move {
            info!(
                "Starting reaper with interval of {} ms",
                interval.as_millis()
            );

            loop {
                tokio::time::sleep(interval).await;

                let culled = sweep(callbacks.as_ref(), &policy).await;
                if culled > 0 {
                    info!("Reaper sweep: culled {} entries", culled);
                } else {
                    debug!("Reaper sweep: nothing to cull");
                }
            }
        }));
    }

    // == Stop ==
    /// Cancels periodic sweeping.
    pub fn stop(&self) {
        if let Some(handle) = self.task().take() {
            handle.abort();
            info!("Reaper stopped");
        }
    }

    /// Returns true while periodic sweeping is active.
    pub fn is_running(&self) -> bool {
        self.task()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn cull_records(callbacks: &dyn ReaperCallbacks, records: &[Metadata]) -> usize {
    let mut culled = 0;

    for record in records {
        match callbacks.delete(&record.key).await {
            Ok(true) => culled += 1,
            Ok(false) => debug!("Cull skipped '{}': key already gone", record.key),
            Err(err) => warn!("Failed to cull '{}': {}", record.key, err),
        }
    }

    culled
}

async fn sweep(callbacks: &dyn ReaperCallbacks, policy: &ReaperPolicy) -> usize {
    let mut culled = 0;

    if policy.cull_expired {
        let expired: Vec<Metadata> = callbacks
            .metadata()
            .await
            .into_iter()
            .filter(|record| !record.is_fresh())
            .collect();
        culled += cull_records(callbacks, &expired).await;
    }

    if let Some(limit) = policy.heap_limit {
        if callbacks.try_begin_reduction() {
            culled += reduce(callbacks, limit).await;
            callbacks.end_reduction();
        } else {
            debug!("Sweep skipped reduction: another one is in flight");
        }
    }

    culled
}

/// Culls the cold tail if the ledger is still over threshold. The caller
/// holds the reduction slot.
async fn reduce(callbacks: &dyn ReaperCallbacks, limit: HeapLimit) -> usize {
    let snapshot = callbacks.metadata().await;
    let used: u64 = snapshot.iter().map(|record| record.size).sum();
    if !limit.is_exceeded(used) {
        return 0;
    }

    match select_victim_chunk(&snapshot, limit.reduction_target) {
        Some(index) => cull_records(callbacks, &snapshot[index..]).await,
        None => 0,
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
