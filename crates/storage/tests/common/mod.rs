pub mod fixtures;

use quire_storage::{FilesystemStore, FragmentStore, MemoryStore, SqliteFragmentStore};
use std::sync::Arc;
use tempfile::TempDir;

/// A store under test plus whatever keeps its backing files alive.
pub struct TestStore {
    pub store: Arc<dyn FragmentStore>,
    _temp_dir: Option<TempDir>,
}

#[allow(dead_code)]
impl TestStore {
    pub fn memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            _temp_dir: None,
        }
    }

    pub async fn filesystem() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = FilesystemStore::new(temp_dir.path(), quire_core::RECORD_SIZE_CEILING)
            .await
            .expect("Failed to create filesystem store");
        Self {
            store: Arc::new(store),
            _temp_dir: Some(temp_dir),
        }
    }

    pub async fn sqlite() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteFragmentStore::new(
            temp_dir.path().join("fragments.db"),
            quire_core::RECORD_SIZE_CEILING,
        )
        .await
        .expect("Failed to create sqlite store");
        Self {
            store: Arc::new(store),
            _temp_dir: Some(temp_dir),
        }
    }

    /// One instance of every backend.
    pub async fn all() -> Vec<Self> {
        vec![Self::memory(), Self::filesystem().await, Self::sqlite().await]
    }
}
