//! Cachemap - a caching facade over pluggable storage backends
//!
//! Adds HTTP cache-header expiry, per-key access metadata, heap-size
//! accounting and threshold-driven eviction on top of an in-memory map or
//! Redis, and serves it over HTTP or from an off-task worker.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod freshness;
pub mod keys;
pub mod models;
pub mod store;
pub mod tasks;
pub mod worker;

pub use api::AppState;
pub use cache::{Cachemap, HasOptions, KeyOptions, SetOptions};
pub use config::{CachemapOptions, Config};
pub use error::{CacheError, Lookup, Result};
pub use worker::WorkerCachemap;
