//! Key/value stores backing the Local Storage provider
//!
//! Two implementations of [`IKeyValueStore`]:
//!
//! - [`MemoryKeyValueStore`] - process-local map, optional quota
//! - [`SqliteKeyValueStore`] - persistent SQLite table, mandatory quota
//!
//! Both count a value's size as the UTF-8 length of key plus value and
//! reject a write that would push the total past the quota, leaving the
//! previous value in place.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;

use cloudfm_core::ports::{IKeyValueStore, StoreError};

use crate::StorageError;

fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

fn check_quota(total_after: u64, quota: Option<u64>) -> Result<(), StoreError> {
    match quota {
        Some(quota) if total_after > quota => Err(StoreError::QuotaExceeded {
            needed: total_after,
            quota,
        }),
        _ => Ok(()),
    }
}

// ============================================================================
// MemoryKeyValueStore
// ============================================================================

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota: Option<u64>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store refusing writes beyond `quota` bytes
    pub fn with_quota(quota: u64) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota: Some(quota),
        }
    }

    /// Bytes currently held
    pub async fn used_bytes(&self) -> u64 {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum()
    }
}

#[async_trait::async_trait]
impl IKeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let used: u64 = entries.iter().map(|(k, v)| entry_size(k, v)).sum();
        let previous = entries.get(key).map(|v| entry_size(key, v)).unwrap_or(0);
        check_quota(used - previous + entry_size(key, value), self.quota)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .await
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

// ============================================================================
// SqliteKeyValueStore
// ============================================================================

const SCHEMA: &str = include_str!("migrations/0001_key_value.sql");

/// SQLite-backed store
///
/// The quota check and the write run in one transaction, so concurrent
/// writers cannot jointly overshoot the quota. Clones share the pool.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
    quota: u64,
}

impl SqliteKeyValueStore {
    /// Opens (creating if needed) the store file at `db_path`
    ///
    /// Missing parent directories are created and the `kv_entries` table is
    /// set up on first use. The file runs in WAL mode so a second process
    /// can read while this one writes.
    ///
    /// # Errors
    /// Returns `StorageError::Open` if the file cannot be opened and
    /// `StorageError::Schema` if the table cannot be created.
    pub async fn open(db_path: &Path, quota: u64) -> Result<Self, StorageError> {
        let open_error = |reason: String| StorageError::Open {
            path: db_path.display().to_string(),
            reason,
        };
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| open_error(e.to_string()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| open_error(e.to_string()))?;

        let store = Self::with_schema(pool, quota).await?;
        tracing::info!(
            path = %db_path.display(),
            quota,
            used = store.used_bytes().await?,
            "Opened Local Storage database"
        );
        Ok(store)
    }

    /// A throwaway store living in one in-memory connection
    pub async fn in_memory(quota: u64) -> Result<Self, StorageError> {
        // An in-memory database is private to its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StorageError::Open {
                path: ":memory:".to_string(),
                reason: e.to_string(),
            })?;
        Self::with_schema(pool, quota).await
    }

    async fn with_schema(pool: SqlitePool, quota: u64) -> Result<Self, StorageError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| StorageError::Schema(e.to_string()))?;
        Ok(Self { pool, quota })
    }

    /// Byte limit on keys plus values
    pub fn quota(&self) -> u64 {
        self.quota
    }

    /// Bytes currently held
    pub async fn used_bytes(&self) -> Result<u64, StorageError> {
        let used: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(size_bytes), 0) FROM kv_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(used as u64)
    }

    async fn try_set(&self, key: &str, value: &str) -> Result<Result<(), StoreError>, StorageError> {
        let mut tx = self.pool.begin().await?;

        let used: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(size_bytes), 0) FROM kv_entries")
            .fetch_one(&mut *tx)
            .await?;
        let previous: Option<i64> =
            sqlx::query_scalar("SELECT size_bytes FROM kv_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;

        let size = entry_size(key, value);
        let total_after = (used - previous.unwrap_or(0)) as u64 + size;
        if let Err(e) = check_quota(total_after, Some(self.quota)) {
            tx.rollback().await?;
            return Ok(Err(e));
        }

        sqlx::query(
            "INSERT OR REPLACE INTO kv_entries (key, value, size_bytes, updated_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(size as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::trace!(key, size, "Stored value");
        Ok(Ok(()))
    }
}

#[async_trait::async_trait]
impl IKeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.try_set(key, value).await?
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT key FROM kv_entries WHERE substr(key, 1, ?) = ? ORDER BY key",
        )
        .bind(prefix.chars().count() as i64)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(keys)
    }
}
