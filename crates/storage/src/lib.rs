//! Fragment record store abstraction and backends for Quire.
//!
//! This crate provides:
//! - The [`FragmentStore`] contract: put, lookup by index, query by document, delete by document
//! - Per-record size ceiling enforcement
//! - Backends: in-memory, local filesystem and SQLite

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemStore, memory::MemoryStore, sqlite::SqliteFragmentStore};
pub use error::{StoreError, StoreResult};
pub use traits::{FragmentStore, check_record_size, record_key, record_size};

use quire_core::config::StorageConfig;
use std::sync::Arc;

/// Create a fragment store from configuration.
pub async fn from_config(
    config: &StorageConfig,
    record_size_ceiling: usize,
) -> StoreResult<Arc<dyn FragmentStore>> {
    config.validate().map_err(StoreError::Config)?;

    match config {
        StorageConfig::Memory => Ok(Arc::new(MemoryStore::new(record_size_ceiling))),
        StorageConfig::Filesystem { path } => {
            let store = FilesystemStore::new(path, record_size_ceiling).await?;
            Ok(Arc::new(store))
        }
        StorageConfig::Sqlite { path } => {
            let store = SqliteFragmentStore::new(path, record_size_ceiling).await?;
            Ok(Arc::new(store))
        }
    }
}
