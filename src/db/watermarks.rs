//! SQLite-backed watermark store.

use super::{WatermarkError, WatermarkStore};
use crate::domain::TimeMs;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

/// Watermarks persisted in the `watermarks` table.
#[derive(Debug, Clone)]
pub struct SqliteWatermarkStore {
    pool: SqlitePool,
}

impl SqliteWatermarkStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteWatermarkStore { pool }
    }

    /// All stored keys, for diagnostics.
    pub async fn keys(&self) -> Result<Vec<String>, WatermarkError> {
        let rows = sqlx::query("SELECT key FROM watermarks ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>("key")).collect())
    }
}

#[async_trait]
impl WatermarkStore for SqliteWatermarkStore {
    async fn get(&self, key: &str) -> Result<Option<TimeMs>, WatermarkError> {
        let row = sqlx::query("SELECT time_ms FROM watermarks WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| TimeMs::new(r.get::<i64, _>("time_ms"))))
    }

    async fn set(&self, key: &str, at: TimeMs) -> Result<(), WatermarkError> {
        sqlx::query(
            r#"
            INSERT INTO watermarks (key, time_ms, updated_at_ms)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                time_ms = excluded.time_ms,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(key)
        .bind(at.as_ms())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use tempfile::TempDir;

    async fn setup_store() -> (SqliteWatermarkStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("watermarks.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (SqliteWatermarkStore::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let (store, _temp) = setup_store().await;
        assert_eq!(store.get("notifications:x:last_seen").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_overwrite() {
        let (store, _temp) = setup_store().await;
        store.set("k", TimeMs::new(100)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(TimeMs::new(100)));

        store.set("k", TimeMs::new(50)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(TimeMs::new(50)));
        assert_eq!(store.keys().await.unwrap(), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("watermarks.db")
            .to_string_lossy()
            .to_string();

        {
            let store = SqliteWatermarkStore::new(init_db(&db_path).await.unwrap());
            store.set("k", TimeMs::new(7)).await.unwrap();
        }

        let store = SqliteWatermarkStore::new(init_db(&db_path).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(TimeMs::new(7)));
    }
}
