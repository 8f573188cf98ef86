//! In-memory map backend.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::Store;
use crate::error::StoreResult;

/// Hash map backed store living in the current process.
#[derive(Debug, Default)]
pub struct MapStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MapStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn clear(&self) -> StoreResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn size(&self) -> StoreResult<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn entries(&self) -> StoreResult<Vec<(String, Value)>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
