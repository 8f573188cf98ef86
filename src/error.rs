//! Error types for the cachemap facade
//!
//! Provides unified error handling using thiserror.
//!
//! Storage faults are split by path: write paths (`set`, `delete`, `clear`)
//! propagate a [`CacheError::Store`], read paths (`get`, `has`) degrade into
//! a [`Lookup::Degraded`] so callers only ever observe absence.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Store Error ==
/// Failure reported by a storage backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend rejected or failed the operation
    #[error("backend failure: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded
    #[error("serialization failure: {0}")]
    Serialization(String),

    /// The backend could not be reached
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

// == Validation Error ==
/// A single malformed input to a public operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("key cannot be empty")]
    EmptyKey,

    #[error("key exceeds maximum length of {max} bytes (got {len})")]
    KeyTooLong { len: usize, max: usize },

    #[error("key '{0}' is reserved for the metadata backup")]
    ReservedKey(String),

    #[error("cache name cannot be empty")]
    EmptyName,

    #[error("max heap size must be greater than zero")]
    ZeroHeapSize,

    #[error("reaper interval must be greater than zero")]
    ZeroReaperInterval,
}

// == Cache Error Enum ==
/// Unified error type for the cachemap facade.
#[derive(Error, Debug)]
pub enum CacheError {
    /// One or more validation issues, reported together
    #[error("Invalid request: {}", join_validation(.0))]
    Validation(Vec<ValidationError>),

    /// Key not found (HTTP surface only, the facade reports absence as a value)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Storage backend failure on a write path
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Requested backend cannot run in the current runtime
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// The off-thread worker has stopped or was never created
    #[error("Worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Wraps collected validation issues, or returns `Ok` when there are none.
    pub fn check(errors: Vec<ValidationError>) -> Result<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CacheError::Validation(errors))
        }
    }
}

fn join_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Validation(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Store(_) => StatusCode::BAD_GATEWAY,
            CacheError::UnsupportedBackend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::WorkerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Lookup ==
/// Outcome of a read-path operation.
///
/// `Degraded` carries the storage fault that was absorbed; it reads as a
/// miss to callers that only care about presence.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    Missing,
    Degraded(StoreError),
}

impl<T> Lookup<T> {
    /// Collapses the lookup into an option, treating degradation as absence.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Missing | Lookup::Degraded(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Lookup::Degraded(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::Missing => Lookup::Missing,
            Lookup::Degraded(err) => Lookup::Degraded(err),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cachemap facade.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Result type returned by storage backends.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
