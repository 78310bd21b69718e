//! Metadata Storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::MetadataStore,
};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::PathBuf;
use tracing::debug;

/// SQLITE_FULL primary result code.
const SQLITE_FULL: &str = "13";

/// SQLite-backed metadata store
///
/// Every record is one row holding a JSON document. The library index and
/// the per-record entries share the table; keys carry the namespace.
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    /// Open (or create) the store at `db_path`.
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;

        Self::create_schema(&pool).await?;
        debug!(path = ?db_path, "Initialized metadata store");

        Ok(Self { pool })
    }

    /// Create an in-memory store (for testing)
    ///
    /// Pinned to one connection: each SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;

        Self::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    fn map_sqlx(context: &str, e: sqlx::Error) -> BridgeError {
        if let sqlx::Error::Database(db) = &e {
            if db.code().as_deref() == Some(SQLITE_FULL) {
                return BridgeError::StorageFull(format!("{}: {}", context, db.message()));
            }
        }
        BridgeError::DatabaseError(format!("{}: {}", context, e))
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::map_sqlx("Failed to get record", e))?;

        match row {
            Some(row) => {
                let raw: String = row.get(0);
                let value = serde_json::from_str(&raw).map_err(|e| {
                    BridgeError::OperationFailed(format!("Corrupt record '{}': {}", key, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let raw = serde_json::to_string(&value)
            .map_err(|e| BridgeError::OperationFailed(format!("Serialize failed: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO metadata (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(raw)
        .bind(Self::now())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_sqlx("Failed to set record", e))?;

        debug!(key = key, "Stored record");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM metadata WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::map_sqlx("Failed to delete record", e))?;

        debug!(key = key, "Deleted record");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM metadata")
            .execute(&self.pool)
            .await
            .map_err(|e| Self::map_sqlx("Failed to clear records", e))?;

        debug!("Cleared all records");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM metadata ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::map_sqlx("Failed to list keys", e))?;

        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_roundtrip() {
        let store = SqliteMetadataStore::in_memory().await.unwrap();

        store
            .set("album:a1", json!({"id": "a1", "tracks": ["t1", "t2"]}))
            .await
            .unwrap();
        let value = store.get("album:a1").await.unwrap().unwrap();
        assert_eq!(value["tracks"][1], "t2");

        store.remove("album:a1").await.unwrap();
        assert!(store.get("album:a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = SqliteMetadataStore::in_memory().await.unwrap();

        store.set("library_cache", json!({"v": 1})).await.unwrap();
        store.set("library_cache", json!({"v": 2})).await.unwrap();

        assert_eq!(store.get("library_cache").await.unwrap().unwrap()["v"], 2);
        assert_eq!(store.keys().await.unwrap(), vec!["library_cache"]);
    }

    #[tokio::test]
    async fn test_clear_and_keys() {
        let store = SqliteMetadataStore::in_memory().await.unwrap();

        store.set("t2", json!({})).await.unwrap();
        store.set("playlist:p1", json!({})).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["playlist:p1", "t2"]);

        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metadata.db");

        {
            let store = SqliteMetadataStore::new(path.clone()).await.unwrap();
            store.set("t1", json!({"name": "Song"})).await.unwrap();
        }

        let reopened = SqliteMetadataStore::new(path).await.unwrap();
        assert_eq!(reopened.get("t1").await.unwrap().unwrap()["name"], "Song");
    }
}
