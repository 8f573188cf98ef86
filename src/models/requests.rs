//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{HasOptions, KeyOptions, SetOptions};
use crate::freshness::CacheHeaders;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `cacheHeaders`: Response headers deciding storability and expiry
/// - `hash`: Store under the SHA-256 digest of the key
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    #[serde(default)]
    pub cache_headers: Option<CacheHeaders>,
    #[serde(default)]
    pub hash: bool,
}

impl SetRequest {
    /// Facade options carried by this request
    pub fn options(&self) -> SetOptions {
        SetOptions {
            cache_headers: self.cache_headers.clone(),
            hash: self.hash,
        }
    }
}

/// Query string accepted by the key-addressed endpoints
/// (`?hash=true&deleteExpired=true`)
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyQuery {
    pub hash: bool,
    /// Only meaningful for GET /has/:key
    pub delete_expired: bool,
}

impl KeyQuery {
    pub fn key_options(&self) -> KeyOptions {
        KeyOptions { hash: self.hash }
    }

    pub fn has_options(&self) -> HasOptions {
        HasOptions {
            delete_expired: self.delete_expired,
            hash: self.hash,
        }
    }
}
