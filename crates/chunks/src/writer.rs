//! Chunked writes: partition an encoded payload into fragments and store them.

use crate::error::ChunkWriteError;
use crate::retry::with_retry;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use quire_core::config::ChunkingConfig;
use quire_core::{DocumentId, EncodedPayload, Fragment, OwnerId, fragment_count, fragment_windows};
use quire_storage::{FragmentStore, StoreError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Writes encoded payloads as fragment sets.
///
/// The document id is always reserved by the caller. A write either stores
/// every fragment `0..total` or, on failure or cancellation, removes whatever
/// it stored before returning the error.
#[derive(Clone)]
pub struct ChunkWriter {
    store: Arc<dyn FragmentStore>,
    config: ChunkingConfig,
}

impl ChunkWriter {
    pub fn new(store: Arc<dyn FragmentStore>, config: ChunkingConfig) -> Self {
        Self { store, config }
    }

    /// Store `payload` under `document_id` and return the number of fragments written.
    pub async fn write_chunked(
        &self,
        document_id: DocumentId,
        owner_id: &OwnerId,
        payload: &EncodedPayload,
    ) -> Result<u32, ChunkWriteError> {
        self.write_with_cancel(document_id, owner_id, payload, &CancellationToken::new())
            .await
    }

    /// Like [`write_chunked`](Self::write_chunked), aborting (with rollback)
    /// when `cancel` fires.
    #[instrument(
        skip(self, owner_id, payload, cancel),
        fields(document_id = %document_id, encoded_len = payload.len())
    )]
    pub async fn write_with_cancel(
        &self,
        document_id: DocumentId,
        owner_id: &OwnerId,
        payload: &EncodedPayload,
        cancel: &CancellationToken,
    ) -> Result<u32, ChunkWriteError> {
        let total = fragment_count(payload.len(), self.config.max_fragment_size)
            .map_err(|source| ChunkWriteError::InvalidPayload {
                document_id,
                source,
            })?;
        if total > self.config.max_fragments_per_document {
            return Err(ChunkWriteError::InvalidPayload {
                document_id,
                source: quire_core::Error::TooManyFragments {
                    encoded_len: payload.len(),
                    max: self.config.max_fragments_per_document,
                },
            });
        }
        if total == 0 {
            debug!("empty payload, nothing to write");
            return Ok(0);
        }

        let existing = with_retry(&self.config.retry, || self.store.query_all(document_id))
            .await
            .map_err(|e| ChunkWriteError::Precheck {
                document_id,
                source: e.source,
            })?;
        if !existing.is_empty() {
            warn!(existing = existing.len(), "refusing to overwrite stored fragments");
            return Err(ChunkWriteError::AlreadyWritten { document_id });
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChunkWriteError::Cancelled { document_id }),
            result = self.put_all(document_id, owner_id, payload, total) => result,
        };

        match outcome {
            Ok(()) => {
                info!(chunk_count = total, backend = self.store.backend_name(), "document written");
                Ok(total)
            }
            Err(cause) => Err(self.rollback(document_id, cause).await),
        }
    }

    async fn put_all(
        &self,
        document_id: DocumentId,
        owner_id: &OwnerId,
        payload: &EncodedPayload,
        total: u32,
    ) -> Result<(), ChunkWriteError> {
        let parallel = self.config.write_concurrency.max(1);
        let mut in_flight = FuturesUnordered::new();

        for (chunk_index, window) in fragment_windows(payload, self.config.max_fragment_size) {
            let fragment = Fragment::new(document_id, owner_id.clone(), chunk_index, total, window);
            in_flight.push(self.put_fragment(fragment));

            if in_flight.len() >= parallel
                && let Some(result) = in_flight.next().await
            {
                result?;
            }
        }

        while let Some(result) = in_flight.next().await {
            result?;
        }
        Ok(())
    }

    async fn put_fragment(&self, fragment: Fragment) -> Result<(), ChunkWriteError> {
        let document_id = fragment.document_id;
        let chunk_index = fragment.chunk_index;

        match with_retry(&self.config.retry, || self.store.put(&fragment)).await {
            Ok(()) => {
                debug!(chunk_index, size = fragment.size(), "fragment stored");
                Ok(())
            }
            // An earlier attempt landed before reporting a transient failure.
            Err(e) if e.attempts > 1 && matches!(e.source, StoreError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(ChunkWriteError::Store {
                document_id,
                chunk_index,
                attempts: e.attempts,
                source: e.source,
            }),
        }
    }

    /// Remove every fragment stored for `document_id` after a failed write.
    async fn rollback(&self, document_id: DocumentId, cause: ChunkWriteError) -> ChunkWriteError {
        warn!(error = %cause, "write failed, rolling back stored fragments");
        match with_retry(&self.config.retry, || self.store.delete_all(document_id)).await {
            Ok(removed) => {
                info!(removed, "rollback complete");
                cause
            }
            Err(e) => {
                error!(error = %e.source, attempts = e.attempts, "rollback failed, fragments may be orphaned");
                ChunkWriteError::RollbackFailed {
                    document_id,
                    cause: Box::new(cause),
                    source: e.source,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_storage::MemoryStore;

    fn writer(max_fragment_size: usize) -> (Arc<MemoryStore>, ChunkWriter) {
        let store = Arc::new(MemoryStore::default());
        let writer = ChunkWriter::new(
            store.clone(),
            ChunkingConfig::with_fragment_size(max_fragment_size),
        );
        (store, writer)
    }

    #[tokio::test]
    async fn test_fragments_carry_total_and_order() {
        let (store, writer) = writer(4);
        let doc = DocumentId::new();
        let payload = EncodedPayload::parse("AAAABBBBCC").unwrap();

        let count = writer
            .write_chunked(doc, &OwnerId::new("alice").unwrap(), &payload)
            .await
            .unwrap();
        assert_eq!(count, 3);

        let mut fragments = store.query_all(doc).await.unwrap();
        fragments.sort_by_key(|f| f.chunk_index);
        let contents: Vec<_> = fragments.iter().map(|f| f.content.as_str()).collect();
        assert_eq!(contents, ["AAAA", "BBBB", "CC"]);
        assert!(fragments.iter().all(|f| f.total_chunks == 3));
        assert!(fragments[2].is_final());
    }

    #[tokio::test]
    async fn test_empty_payload_writes_nothing() {
        let (store, writer) = writer(4);
        let count = writer
            .write_chunked(
                DocumentId::new(),
                &OwnerId::new("alice").unwrap(),
                &EncodedPayload::from_raw(b""),
            )
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_zero_fragment_size_is_invalid() {
        let store = Arc::new(MemoryStore::default());
        let writer = ChunkWriter::new(
            store,
            ChunkingConfig {
                max_fragment_size: 0,
                ..ChunkingConfig::default()
            },
        );
        let result = writer
            .write_chunked(
                DocumentId::new(),
                &OwnerId::new("alice").unwrap(),
                &EncodedPayload::from_raw(b"data"),
            )
            .await;
        assert!(matches!(result, Err(ChunkWriteError::InvalidPayload { .. })));
    }
}
