// Config store port plus the keyed, lock-aware wrapper handlers use.
//
// Every feature keeps its per-guild state here (sticky messages, welcome
// channel, verification, reaction-role bindings, anti-spam settings) instead
// of in ad hoc process-global maps. Records are JSON values addressed by a
// numeric scope (usually a guild id) and a string key.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Single-record-at-a-time persistence. Implementations may be eventually
/// consistent; callers that read-modify-write must hold the key lock.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn find_one(&self, scope: u64, key: &str) -> Result<Option<Value>, StoreError>;
    async fn upsert(&self, scope: u64, key: &str, value: Value) -> Result<(), StoreError>;
    /// Returns whether a record existed.
    async fn delete(&self, scope: u64, key: &str) -> Result<bool, StoreError>;
}

/// One async mutex per key, created on first use.
#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // The DashMap shard guard is released above, before we wait.
        mutex.lock_owned().await
    }
}

/// Typed access to the config store with per-record serialization.
pub struct GuildConfig {
    store: Arc<dyn ConfigStore>,
    locks: KeyedLocks,
}

impl GuildConfig {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    fn lock_key(scope: u64, key: &str) -> String {
        format!("{scope}:{key}")
    }

    /// Hold this while doing a read-modify-write that spans other awaits.
    /// Not reentrant: do not call `update` for the same record while held.
    pub async fn lock(&self, scope: u64, key: &str) -> OwnedMutexGuard<()> {
        self.locks.lock(&Self::lock_key(scope, key)).await
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        scope: u64,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.store.find_one(scope, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn put<T: Serialize>(&self, scope: u64, key: &str, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        self.store.upsert(scope, key, value).await
    }

    pub async fn remove(&self, scope: u64, key: &str) -> Result<bool, StoreError> {
        self.store.delete(scope, key).await
    }

    /// Locked read-modify-write. Returning `None` from `apply` deletes the record.
    pub async fn update<T, F>(&self, scope: u64, key: &str, apply: F) -> Result<Option<T>, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> Option<T>,
    {
        let _guard = self.lock(scope, key).await;
        let current = self.get::<T>(scope, key).await?;
        let next = apply(current);
        match &next {
            Some(record) => self.put(scope, key, record).await?,
            None => {
                self.remove(scope, key).await?;
            }
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::InMemoryConfigStore;

    fn config() -> Arc<GuildConfig> {
        Arc::new(GuildConfig::new(Arc::new(InMemoryConfigStore::new())))
    }

    #[tokio::test]
    async fn typed_round_trip_and_remove() {
        let config = config();
        config.put(1, "counter", &5u32).await.unwrap();

        assert_eq!(config.get::<u32>(1, "counter").await.unwrap(), Some(5));
        assert_eq!(config.get::<u32>(2, "counter").await.unwrap(), None);

        assert!(config.remove(1, "counter").await.unwrap());
        assert!(!config.remove(1, "counter").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_updates_are_not_lost() {
        let config = config();
        let mut tasks = Vec::new();

        for _ in 0..50 {
            let config = Arc::clone(&config);
            tasks.push(tokio::spawn(async move {
                config
                    .update::<u32, _>(9, "counter", |current| {
                        Some(current.unwrap_or(0) + 1)
                    })
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(config.get::<u32>(9, "counter").await.unwrap(), Some(50));
    }

    #[tokio::test]
    async fn update_returning_none_deletes() {
        let config = config();
        config.put(1, "sticky", &"hello").await.unwrap();

        let next = config
            .update::<String, _>(1, "sticky", |_| None)
            .await
            .unwrap();

        assert!(next.is_none());
        assert_eq!(config.get::<String>(1, "sticky").await.unwrap(), None);
    }
}
