//! Local filesystem fragment store.
//!
//! Layout: `<root>/fragments/<document_id>/<chunk_index:010>.json`, one JSON
//! record per fragment.

use crate::error::{StoreError, StoreResult};
use crate::traits::{FragmentStore, check_record_size, record_key};
use async_trait::async_trait;
use quire_core::{DocumentId, Fragment};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

const FRAGMENTS_DIR: &str = "fragments";
const RECORD_EXTENSION: &str = "json";

/// Local filesystem fragment store.
pub struct FilesystemStore {
    root: PathBuf,
    ceiling: usize,
}

impl FilesystemStore {
    /// Create a new filesystem store rooted at `root`.
    pub async fn new(root: impl AsRef<Path>, ceiling: usize) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(FRAGMENTS_DIR)).await?;
        Ok(Self { root, ceiling })
    }

    fn document_dir(&self, document_id: DocumentId) -> PathBuf {
        self.root.join(FRAGMENTS_DIR).join(document_id.to_string())
    }

    fn record_path(&self, document_id: DocumentId, chunk_index: u32) -> PathBuf {
        self.document_dir(document_id)
            .join(format!("{chunk_index:010}.{RECORD_EXTENSION}"))
    }

    async fn read_record(&self, path: &Path, key: &str) -> StoreResult<Option<Fragment>> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Record files in a document directory, skipping in-flight temp files.
    async fn record_paths(&self, document_id: DocumentId) -> StoreResult<Vec<PathBuf>> {
        let dir = self.document_dir(document_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = entry.file_type().await?.is_file()
                && path.extension().is_some_and(|ext| ext == RECORD_EXTENSION)
                && !entry.file_name().to_string_lossy().starts_with('.');
            if is_record {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

#[async_trait]
impl FragmentStore for FilesystemStore {
    #[instrument(skip(self, fragment), fields(backend = "filesystem", document_id = %fragment.document_id, chunk_index = fragment.chunk_index))]
    async fn put(&self, fragment: &Fragment) -> StoreResult<()> {
        check_record_size(fragment, self.ceiling)?;
        let key = record_key(fragment.document_id, fragment.chunk_index);
        let path = self.record_path(fragment.document_id, fragment.chunk_index);

        if fs::try_exists(&path).await? {
            return Err(StoreError::AlreadyExists(key));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec(fragment).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        // Write to a uniquely named temp file, fsync, then rename into place.
        let temp_path = path.with_file_name(format!(".tmp.{}", Uuid::new_v4()));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::Io(e));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_by_index(
        &self,
        document_id: DocumentId,
        chunk_index: u32,
    ) -> StoreResult<Option<Fragment>> {
        let path = self.record_path(document_id, chunk_index);
        self.read_record(&path, &record_key(document_id, chunk_index))
            .await
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn query_all(&self, document_id: DocumentId) -> StoreResult<Vec<Fragment>> {
        let mut fragments = Vec::new();
        for path in self.record_paths(document_id).await? {
            let key = path.display().to_string();
            // A record deleted between listing and reading is skipped.
            if let Some(fragment) = self.read_record(&path, &key).await? {
                fragments.push(fragment);
            }
        }
        Ok(fragments)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete_all(&self, document_id: DocumentId) -> StoreResult<u64> {
        let count = self.record_paths(document_id).await?.len() as u64;
        match fs::remove_dir_all(self.document_dir(document_id)).await {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    fn record_size_ceiling(&self) -> usize {
        self.ceiling
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StoreResult<()> {
        let metadata = fs::metadata(self.root.join(FRAGMENTS_DIR))
            .await
            .map_err(|e| {
                StoreError::Io(std::io::Error::new(
                    e.kind(),
                    format!("storage root not accessible: {e}"),
                ))
            })?;

        if !metadata.is_dir() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::OwnerId;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_record_layout() {
        let temp = tempdir().unwrap();
        let store = FilesystemStore::new(temp.path(), quire_core::RECORD_SIZE_CEILING)
            .await
            .unwrap();
        let doc = DocumentId::new();
        let fragment = Fragment::new(doc, OwnerId::new("o").unwrap(), 7, 8, "QUJD");
        store.put(&fragment).await.unwrap();

        let expected = temp
            .path()
            .join("fragments")
            .join(doc.to_string())
            .join("0000000007.json");
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn test_corrupt_record_reported() {
        let temp = tempdir().unwrap();
        let store = FilesystemStore::new(temp.path(), quire_core::RECORD_SIZE_CEILING)
            .await
            .unwrap();
        let doc = DocumentId::new();
        let path = store.record_path(doc, 0);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{not json").unwrap();

        match store.get_by_index(doc, 0).await {
            Err(StoreError::Corrupt { .. }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_query_skips_temp_files() {
        let temp = tempdir().unwrap();
        let store = FilesystemStore::new(temp.path(), quire_core::RECORD_SIZE_CEILING)
            .await
            .unwrap();
        let doc = DocumentId::new();
        store
            .put(&Fragment::new(doc, OwnerId::new("o").unwrap(), 0, 1, "QQ=="))
            .await
            .unwrap();
        std::fs::write(store.document_dir(doc).join(".tmp.leftover"), b"partial").unwrap();

        assert_eq!(store.query_all(doc).await.unwrap().len(), 1);
    }
}
