//! Cloud File Manager Local - Providers that need no remote account
//!
//! This crate implements `ICloudProvider` from `cloudfm-core` for:
//! - **Local Storage** - documents kept in a quota-limited key/value store
//! - **Local File** - documents handed to the user as downloads and read
//!   back from disk
//! - **URL** - read-only documents fetched through the host
//!
//! ## Architecture
//!
//! These are driven (secondary) adapters in the hexagonal architecture.
//! The Local Storage provider is written against the `IKeyValueStore` port;
//! [`SqliteKeyValueStore`] persists it, [`MemoryKeyValueStore`] backs tests
//! and throwaway sessions.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use cloudfm_local::{LocalStorageProvider, SqliteKeyValueStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let path = Path::new("/home/user/.local/share/cloudfm/local_storage.db");
//! let store = Arc::new(SqliteKeyValueStore::open(path, 5 * 1024 * 1024).await?);
//! let provider = LocalStorageProvider::new(store);
//! # Ok(())
//! # }
//! ```

pub mod local_file;
pub mod local_storage;
pub mod store;
pub mod url;

pub use local_file::LocalFileProvider;
pub use local_storage::LocalStorageProvider;
pub use store::{MemoryKeyValueStore, SqliteKeyValueStore};
pub use url::UrlProvider;

use cloudfm_core::ports::StoreError;

/// Failures of the SQLite key/value store
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The database file could not be opened or created
    #[error("Cannot open Local Storage database {path}: {reason}")]
    Open { path: String, reason: String },

    /// The `kv_entries` table could not be created
    #[error("Cannot prepare Local Storage table: {0}")]
    Schema(String),

    #[error("Local Storage query failed: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Query(e.to_string())
    }
}

impl From<StorageError> for StoreError {
    fn from(e: StorageError) -> Self {
        StoreError::Backend(e.to_string())
    }
}
