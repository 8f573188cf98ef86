//! Redis backend.
//!
//! Values are stored as JSON strings in the selected Redis database. The
//! store owns that database: `clear` flushes it and `size` counts every key
//! in it.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};
use serde_json::Value;
use tracing::{debug, info};

use super::Store;
use crate::error::{StoreError, StoreResult};

/// Store backed by a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Connects to the Redis server at `url`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::open(url).map_err(unavailable)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;

        info!("Connected to Redis at {}", url);
        Ok(Self { conn })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let raw: Option<String> = self.conn().get(key).await.map_err(backend)?;
        raw.map(|raw| decode(&raw)).transpose()
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let raw = serde_json::to_string(&value)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        self.conn().set::<_, _, ()>(key, raw).await.map_err(backend)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let removed: i64 = self.conn().del(key).await.map_err(backend)?;
        Ok(removed > 0)
    }

    async fn has(&self, key: &str) -> StoreResult<bool> {
        self.conn().exists(key).await.map_err(backend)
    }

    async fn clear(&self) -> StoreResult<()> {
        debug!("Flushing Redis database");
        redis::cmd("FLUSHDB")
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(backend)
    }

    async fn size(&self) -> StoreResult<usize> {
        redis::cmd("DBSIZE")
            .query_async::<_, usize>(&mut self.conn())
            .await
            .map_err(backend)
    }

    async fn entries(&self) -> StoreResult<Vec<(String, Value)>> {
        let mut conn = self.conn();
        let keys: Vec<String> = conn.keys("*").await.map_err(backend)?;

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = conn.get(&key).await.map_err(backend)?;
            if let Some(raw) = raw {
                entries.push((key, decode(&raw)?));
            }
        }
        Ok(entries)
    }
}

fn decode(raw: &str) -> StoreResult<Value> {
    serde_json::from_str(raw).map_err(|err| StoreError::Serialization(err.to_string()))
}

fn backend(err: RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn unavailable(err: RedisError) -> StoreError {
    StoreError::Unavailable(err.to_string())
}
