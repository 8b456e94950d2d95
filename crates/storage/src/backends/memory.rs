//! In-process fragment store.

use crate::error::{StoreError, StoreResult};
use crate::traits::{FragmentStore, check_record_size, record_key};
use async_trait::async_trait;
use quire_core::{DocumentId, Fragment};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::instrument;

/// Fragment store held in memory.
///
/// Behaves like a document collection with generated record keys: `put` appends
/// and never checks `(document_id, chunk_index)` uniqueness, so a duplicated
/// index is representable and surfaces on reconstruction. `get_by_index`
/// reports such an index as [`StoreError::Ambiguous`].
pub struct MemoryStore {
    records: RwLock<HashMap<DocumentId, Vec<Fragment>>>,
    ceiling: usize,
}

impl MemoryStore {
    pub fn new(ceiling: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ceiling,
        }
    }

    /// Total number of fragments across all documents.
    pub async fn len(&self) -> usize {
        self.records.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove the fragment at `chunk_index`, returning whether one was found.
    pub async fn remove(&self, document_id: DocumentId, chunk_index: u32) -> bool {
        let mut records = self.records.write().await;
        let Some(fragments) = records.get_mut(&document_id) else {
            return false;
        };
        match fragments.iter().position(|f| f.chunk_index == chunk_index) {
            Some(pos) => {
                fragments.remove(pos);
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(quire_core::RECORD_SIZE_CEILING)
    }
}

#[async_trait]
impl FragmentStore for MemoryStore {
    #[instrument(skip(self, fragment), fields(backend = "memory", document_id = %fragment.document_id, chunk_index = fragment.chunk_index))]
    async fn put(&self, fragment: &Fragment) -> StoreResult<()> {
        check_record_size(fragment, self.ceiling)?;
        self.records
            .write()
            .await
            .entry(fragment.document_id)
            .or_default()
            .push(fragment.clone());
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn get_by_index(
        &self,
        document_id: DocumentId,
        chunk_index: u32,
    ) -> StoreResult<Option<Fragment>> {
        let records = self.records.read().await;
        let Some(fragments) = records.get(&document_id) else {
            return Ok(None);
        };
        let mut matches = fragments.iter().filter(|f| f.chunk_index == chunk_index);
        let Some(first) = matches.next() else {
            return Ok(None);
        };
        let extra = matches.count();
        if extra > 0 {
            return Err(StoreError::Ambiguous {
                key: record_key(document_id, chunk_index),
                matches: extra + 1,
            });
        }
        Ok(Some(first.clone()))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn query_all(&self, document_id: DocumentId) -> StoreResult<Vec<Fragment>> {
        let records = self.records.read().await;
        Ok(records.get(&document_id).cloned().unwrap_or_default())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn delete_all(&self, document_id: DocumentId) -> StoreResult<u64> {
        let removed = self.records.write().await.remove(&document_id);
        Ok(removed.map(|fragments| fragments.len() as u64).unwrap_or(0))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn record_size_ceiling(&self) -> usize {
        self.ceiling
    }
}
