// In-memory ConfigStore. Used by tests and when no data directory is
// writable; everything is lost on restart.

use crate::core::config_store::{ConfigStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

#[derive(Default)]
pub struct InMemoryConfigStore {
    records: DashMap<(u64, String), Value>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn find_one(&self, scope: u64, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .records
            .get(&(scope, key.to_string()))
            .map(|v| v.clone()))
    }

    async fn upsert(&self, scope: u64, key: &str, value: Value) -> Result<(), StoreError> {
        self.records.insert((scope, key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, scope: u64, key: &str) -> Result<bool, StoreError> {
        Ok(self.records.remove(&(scope, key.to_string())).is_some())
    }
}
