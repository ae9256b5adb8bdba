//! Key/value store port (driven/secondary port)
//!
//! Backing store of the Local Storage provider. Mirrors browser
//! `localStorage` semantics: string keys, string values, a byte quota whose
//! exhaustion is the store's only expected write failure.

use thiserror::Error;

/// Errors reported by key/value stores
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Writing the value would exceed the configured quota
    #[error("quota of {quota} bytes exceeded (needed {needed})")]
    QuotaExceeded {
        /// Bytes the store would hold after the write
        needed: u64,
        /// Configured limit
        quota: u64,
    },

    /// The backend failed
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Port trait for string key/value persistence
#[async_trait::async_trait]
pub trait IKeyValueStore: Send + Sync {
    /// Reads a value
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a value atomically; on error the previous value is untouched
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes a value; returns whether it existed
    async fn remove(&self, key: &str) -> Result<bool, StoreError>;

    /// All keys starting with `prefix`, in ascending order
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
