//! Per-operation options accepted by the facade.
//!
//! These are shared by the in-process API, the worker protocol and the HTTP
//! surface, so they serialize with camelCase field names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::Metadata;
use crate::freshness::CacheHeaders;

/// Options for `get` and `delete`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyOptions {
    /// Hash the key before touching storage
    pub hash: bool,
}

impl KeyOptions {
    pub fn hashed() -> Self {
        Self { hash: true }
    }
}

/// Options for `has`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HasOptions {
    /// Delete the entry and report absence if it has expired
    pub delete_expired: bool,
    pub hash: bool,
}

/// Options for `set`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetOptions {
    /// Response headers the value was served with
    pub cache_headers: Option<CacheHeaders>,
    pub hash: bool,
}

impl SetOptions {
    /// Options carrying a `Cache-Control` header value.
    pub fn cache_control(value: impl Into<String>) -> Self {
        Self {
            cache_headers: Some(CacheHeaders::with_cache_control(value)),
            hash: false,
        }
    }

    pub fn hashed(mut self) -> Self {
        self.hash = true;
        self
    }
}

/// Options for `export`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportOptions {
    /// Restrict the export to these effective keys
    pub keys: Option<Vec<String>>,
}

/// Values plus their metadata, as produced by `export` and consumed by
/// `import`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportResult {
    pub entries: Vec<(String, Value)>,
    pub metadata: Vec<Metadata>,
}

/// Options for `import`.
pub type ImportOptions = ExportResult;
