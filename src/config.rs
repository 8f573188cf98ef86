//! Configuration Module
//!
//! Facade options ([`CachemapOptions`]) and the server configuration loaded
//! from environment variables ([`Config`]).

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{HeapLimit, SortComparator};
use crate::error::ValidationError;
use crate::store::BackendKind;
use crate::tasks::ReaperOptions;

// == Execution Context ==
/// Where the cache runs; decides whether `private` responses may be stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionContext {
    /// Shared cache: `private` responses are never stored
    #[default]
    Server,
    /// Single-user cache: `private` responses may be stored
    Client,
}

// == Redis Options ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedisOptions {
    pub url: String,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

// == Cachemap Options ==
/// Options recognised when creating a cachemap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachemapOptions {
    /// Instance name, also used to key the persisted metadata backup
    pub name: String,
    /// Storage backend
    pub backend: BackendKind,
    /// Byte ceiling; None picks the backend default
    pub max_heap_size: Option<u64>,
    /// Treat every entry as fresh
    pub disable_cache_invalidation: bool,
    /// Periodic culling
    pub reaper: ReaperOptions,
    /// Ledger ranking override
    #[serde(skip)]
    pub sort_comparator: Option<SortComparator>,
    pub execution_context: ExecutionContext,
    pub redis: RedisOptions,
}

impl CachemapOptions {
    /// Creates options for a map-backed cachemap called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_max_heap_size(mut self, bytes: u64) -> Self {
        self.max_heap_size = Some(bytes);
        self
    }

    pub fn with_cache_invalidation_disabled(mut self, disabled: bool) -> Self {
        self.disable_cache_invalidation = disabled;
        self
    }

    pub fn with_reaper(mut self, reaper: ReaperOptions) -> Self {
        self.reaper = reaper;
        self
    }

    pub fn with_sort_comparator(mut self, comparator: SortComparator) -> Self {
        self.sort_comparator = Some(comparator);
        self
    }

    pub fn with_execution_context(mut self, context: ExecutionContext) -> Self {
        self.execution_context = context;
        self
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis.url = url.into();
        self
    }

    /// Effective byte ceiling, None when unbounded.
    pub fn resolved_max_heap_size(&self) -> Option<u64> {
        self.max_heap_size
            .or_else(|| self.backend.default_max_heap_size())
    }

    /// Eviction threshold and reduction target, None when unbounded.
    pub fn heap_limit(&self) -> Option<HeapLimit> {
        self.resolved_max_heap_size().map(HeapLimit::for_max_heap_size)
    }

    /// Heap usage above which eviction runs, None when unbounded.
    pub fn max_heap_threshold(&self) -> Option<u64> {
        self.heap_limit().map(|limit| limit.threshold)
    }

    /// Collects every problem with these options.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
        }
        if self.max_heap_size == Some(0) {
            errors.push(ValidationError::ZeroHeapSize);
        }
        if self.reaper.interval.is_zero() {
            errors.push(ValidationError::ZeroReaperInterval);
        }

        errors
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cachemap instance name
    pub cache_name: String,
    /// Storage backend
    pub backend: BackendKind,
    /// Byte ceiling, None picks the backend default
    pub max_heap_size: Option<u64>,
    /// Redis server URL (redis backend only)
    pub redis_url: String,
    /// Periodic reaper interval in milliseconds, None disables periodic mode
    pub reaper_interval_ms: Option<u64>,
    /// Treat every entry as fresh
    pub disable_cache_invalidation: bool,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAME` - Cachemap name (default: "cachemap")
    /// - `CACHE_BACKEND` - map or redis (default: map)
    /// - `MAX_HEAP_SIZE` - Byte ceiling (default: backend default)
    /// - `REDIS_URL` - Redis URL (default: redis://127.0.0.1:6379)
    /// - `REAPER_INTERVAL_MS` - Periodic sweep interval (default: disabled)
    /// - `DISABLE_CACHE_INVALIDATION` - true/false (default: false)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_name: env::var("CACHE_NAME").unwrap_or(defaults.cache_name),
            backend: env::var("CACHE_BACKEND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.backend),
            max_heap_size: env::var("MAX_HEAP_SIZE")
                .ok()
                .and_then(|v| v.parse().ok()),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            reaper_interval_ms: env::var("REAPER_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
            disable_cache_invalidation: env::var("DISABLE_CACHE_INVALIDATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.disable_cache_invalidation),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
        }
    }

    /// Builds the cachemap options this server runs with.
    pub fn cachemap_options(&self) -> CachemapOptions {
        let reaper = match self.reaper_interval_ms {
            Some(ms) => ReaperOptions {
                interval: Duration::from_millis(ms),
                start: true,
            },
            None => ReaperOptions::default(),
        };

        CachemapOptions {
            name: self.cache_name.clone(),
            backend: self.backend,
            max_heap_size: self.max_heap_size,
            disable_cache_invalidation: self.disable_cache_invalidation,
            reaper,
            sort_comparator: None,
            execution_context: ExecutionContext::Server,
            redis: RedisOptions {
                url: self.redis_url.clone(),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_name: "cachemap".to_string(),
            backend: BackendKind::Map,
            max_heap_size: None,
            redis_url: RedisOptions::default().url,
            reaper_interval_ms: None,
            disable_cache_invalidation: false,
            server_port: 3000,
        }
    }
}
