// SQLite-backed ConfigStore.
//
// Table:
// - guild_config: one JSON record per (scope, key)

use crate::core::config_store::{ConfigStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteConfigStore {
    pool: Pool<Sqlite>,
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

impl SqliteConfigStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file and run migrations.
    pub async fn open(path: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .connect(&format!("sqlite://{}?mode=rwc", path))
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_config (
                scope INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (scope, key)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn find_one(&self, scope: u64, key: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT value FROM guild_config WHERE scope = ? AND key = ?")
            .bind(scope as i64)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        match row {
            Some(row) => {
                let raw: String = row.get("value");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, scope: u64, key: &str, value: Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO guild_config (scope, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(scope, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(scope as i64)
        .bind(key)
        .bind(serde_json::to_string(&value)?)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn delete(&self, scope: u64, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM guild_config WHERE scope = ? AND key = ?")
            .bind(scope as i64)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteConfigStore::open(path).await.unwrap();
            store
                .upsert(1, "welcome", json!({"channel_id": 30}))
                .await
                .unwrap();
            store
                .upsert(1, "welcome", json!({"channel_id": 31}))
                .await
                .unwrap();
            store.upsert(2, "welcome", json!(null)).await.unwrap();
        }

        let store = SqliteConfigStore::open(path).await.unwrap();
        assert_eq!(
            store.find_one(1, "welcome").await.unwrap(),
            Some(json!({"channel_id": 31}))
        );
        assert!(store.delete(2, "welcome").await.unwrap());
        assert!(!store.delete(2, "welcome").await.unwrap());
        assert_eq!(store.find_one(3, "welcome").await.unwrap(), None);
    }
}
