//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::debug;

use crate::cache::Cachemap;
use crate::config::Config;
use crate::error::{CacheError, Lookup, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HasResponse, HealthResponse, KeyQuery,
    SetRequest, SetResponse, StatsResponse,
};
use crate::worker::{dispatch, Message, Reply};

/// Application state shared across all handlers.
///
/// The cachemap handle is cheap to clone and synchronizes internally.
#[derive(Clone)]
pub struct AppState {
    pub cache: Cachemap,
}

impl AppState {
    /// Creates a new AppState around an existing cachemap.
    pub fn new(cache: Cachemap) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the cachemap on the configured backend, restoring persisted
    /// metadata where the backend supports it.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let cache = Cachemap::create(config.cachemap_options()).await?;
        Ok(Self::new(cache))
    }
}

/// Handler for PUT /set
///
/// Stores a JSON value; the cache headers decide whether it is stored and
/// when it expires.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    let options = req.options();
    let stored = state.cache.set(&req.key, req.value, options).await?;

    Ok(Json(SetResponse::new(req.key, stored)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value by key. Missing and degraded lookups are both 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key, query.key_options()).await? {
        Lookup::Found(value) => Ok(Json(GetResponse::new(key, value))),
        Lookup::Missing => Err(CacheError::NotFound(key)),
        Lookup::Degraded(err) => {
            debug!("GET '{}' degraded: {}", key, err);
            Err(CacheError::NotFound(key))
        }
    }
}

/// Handler for GET /has/:key
///
/// Reports the freshness of a stored entry. `?deleteExpired=true` removes
/// an expired entry and answers 404.
pub async fn has_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<HasResponse>> {
    match state.cache.has(&key, query.has_options()).await?.found() {
        Some(freshness) => Ok(Json(HasResponse::new(key, freshness))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<DeleteResponse>> {
    if state.cache.delete(&key, query.key_options()).await? {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    state.cache.clear().await?;
    Ok(Json(ClearResponse::new(state.cache.name())))
}

/// Handler for GET /stats
///
/// Returns counters plus current heap usage.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats().await;

    Json(StatsResponse::new(
        state.cache.name(),
        state.cache.backend().as_str(),
        &stats,
    ))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for POST /rpc
///
/// Executes a worker protocol message against the server's cachemap.
pub async fn rpc_handler(
    State(state): State<AppState>,
    Json(message): Json<Message>,
) -> Result<Json<Reply>> {
    Ok(Json(dispatch(&state.cache, message).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyOptions;
    use crate::config::CachemapOptions;
    use crate::freshness::CacheHeaders;
    use serde_json::json;

    async fn test_state() -> AppState {
        AppState::new(Cachemap::create(CachemapOptions::new("handlers")).await.unwrap())
    }

    fn set_request(key: &str, value: serde_json::Value) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            cache_headers: None,
            hash: false,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state().await;

        let req = set_request("test_key", json!("test_value"));
        let result = set_handler(State(state.clone()), Json(req)).await;
        assert!(result.unwrap().stored);

        let result = get_handler(
            State(state.clone()),
            Path("test_key".to_string()),
            Query(KeyQuery::default()),
        )
        .await;
        assert_eq!(result.unwrap().value, json!("test_value"));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = test_state().await;

        let result = get_handler(
            State(state),
            Path("nonexistent".to_string()),
            Query(KeyQuery::default()),
        )
        .await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_no_store_not_stored() {
        let state = test_state().await;

        let mut req = set_request("k", json!(1));
        req.cache_headers = Some(CacheHeaders::with_cache_control("no-store"));
        let response = set_handler(State(state.clone()), Json(req)).await.unwrap();

        assert!(!response.stored);
        assert_eq!(state.cache.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_has_handler() {
        let state = test_state().await;
        let mut req = set_request("k", json!(1));
        req.cache_headers = Some(CacheHeaders::with_cache_control("max-age=60"));
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        let response = has_handler(
            State(state.clone()),
            Path("k".to_string()),
            Query(KeyQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(response.freshness.cache_control.max_age, Some(60));
        assert!(response.ttl_remaining_ms.is_some());
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state().await;

        let req = set_request("to_delete", json!("value"));
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        let result = delete_handler(
            State(state.clone()),
            Path("to_delete".to_string()),
            Query(KeyQuery::default()),
        )
        .await;
        assert!(result.is_ok());

        let result = delete_handler(
            State(state.clone()),
            Path("to_delete".to_string()),
            Query(KeyQuery::default()),
        )
        .await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
        assert!(state
            .cache
            .get("to_delete", KeyOptions::default())
            .await
            .unwrap()
            .found()
            .is_none());
    }

    #[tokio::test]
    async fn test_clear_handler() {
        let state = test_state().await;
        set_handler(State(state.clone()), Json(set_request("a", json!(1))))
            .await
            .unwrap();

        let response = clear_handler(State(state.clone())).await.unwrap();
        assert!(response.message.contains("handlers"));
        assert_eq!(state.cache.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state().await;

        let response = stats_handler(State(state)).await;
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 0);
        assert_eq!(response.backend, "map");
        assert_eq!(response.max_heap_size, Some(1_048_576));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state().await;

        let req = set_request("", json!("value"));
        let result = set_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rpc_handler() {
        let state = test_state().await;

        let message = Message::Set {
            key: "k".to_string(),
            value: json!("v"),
            options: Default::default(),
        };
        let reply = rpc_handler(State(state.clone()), Json(message)).await.unwrap();
        assert_eq!(reply.result, json!(true));
        assert_eq!(reply.used_heap_size, 2);

        let reply = rpc_handler(State(state), Json(Message::Size)).await.unwrap();
        assert_eq!(reply.result, json!(1));
    }

    #[tokio::test]
    async fn test_from_config() {
        let state = AppState::from_config(&Config::default()).await.unwrap();
        assert_eq!(state.cache.name(), "cachemap");
    }
}
