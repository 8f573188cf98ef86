//! Storage Backend Module
//!
//! Uniform key/value capability set the facade stores values through, plus
//! the factory that builds a backend from a [`BackendKind`].

mod map;
mod redis;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CachemapOptions;
use crate::error::{CacheError, Result, StoreResult};

pub use self::map::MapStore;
pub use self::redis::RedisStore;

const MEGABYTE: u64 = 1024 * 1024;

// == Store Trait ==
/// Key/value storage backend.
///
/// Implementations must be safe to share across tasks; the facade is their
/// only writer.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the value stored under `key`, if any.
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Removes `key`, returning whether it was present.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    async fn has(&self, key: &str) -> StoreResult<bool>;

    async fn clear(&self) -> StoreResult<()>;

    /// Number of stored entries.
    async fn size(&self) -> StoreResult<usize>;

    /// All stored key/value pairs, in no particular order.
    async fn entries(&self) -> StoreResult<Vec<(String, Value)>>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        (**self).delete(key).await
    }

    async fn has(&self, key: &str) -> StoreResult<bool> {
        (**self).has(key).await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }

    async fn size(&self) -> StoreResult<usize> {
        (**self).size().await
    }

    async fn entries(&self) -> StoreResult<Vec<(String, Value)>> {
        (**self).entries().await
    }
}

// == Backend Kind ==
/// Storage backends a cachemap can be built on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    /// In-process hash map
    #[default]
    Map,
    /// Browser local storage
    LocalStorage,
    /// Browser IndexedDB
    #[serde(rename = "indexedDB")]
    IndexedDb,
    /// Remote Redis server
    Redis,
}

impl BackendKind {
    /// Default byte ceiling, None when the backend is unbounded.
    pub fn default_max_heap_size(self) -> Option<u64> {
        match self {
            BackendKind::LocalStorage | BackendKind::IndexedDb => Some(5 * MEGABYTE),
            BackendKind::Redis => None,
            BackendKind::Map => Some(MEGABYTE),
        }
    }

    /// Whether the backend outlives the process, so the ledger is backed up
    /// alongside the values.
    pub fn persists_metadata(self) -> bool {
        !matches!(self, BackendKind::Map)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Map => "map",
            BackendKind::LocalStorage => "localStorage",
            BackendKind::IndexedDb => "indexedDB",
            BackendKind::Redis => "redis",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "map" => Ok(BackendKind::Map),
            "localstorage" => Ok(BackendKind::LocalStorage),
            "indexeddb" => Ok(BackendKind::IndexedDb),
            "redis" => Ok(BackendKind::Redis),
            other => Err(CacheError::UnsupportedBackend(format!(
                "unknown backend '{}', expected map, localStorage, indexedDB or redis",
                other
            ))),
        }
    }
}

// == Factory ==
/// Builds the backend selected by `options.backend`.
///
/// Browser backends have no native implementation and are rejected rather
/// than silently replaced with a map.
pub async fn create_store(options: &CachemapOptions) -> Result<Box<dyn Store>> {
    match options.backend {
        BackendKind::Map => Ok(Box::new(MapStore::new())),
        BackendKind::Redis => {
            let store = RedisStore::connect(&options.redis.url).await?;
            Ok(Box::new(store))
        }
        kind @ (BackendKind::LocalStorage | BackendKind::IndexedDb) => {
            Err(CacheError::UnsupportedBackend(format!(
                "{} is only available in a browser runtime",
                kind
            )))
        }
    }
}
