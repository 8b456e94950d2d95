//! Document-level upload, download and maintenance.

use crate::error::{ChunkWriteError, ContentError};
use crate::preprocess::{ImagePreprocessor, PassThrough, Preprocessor};
use crate::reader::ChunkReader;
use crate::writer::ChunkWriter;
use bytes::Bytes;
use quire_core::config::AppConfig;
use quire_core::{DocumentId, DocumentRecord, EncodedPayload, OwnerId};
use quire_metadata::{DocumentRow, MetadataStore, ReadyCommit};
use quire_storage::FragmentStore;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Default page size for [`ContentService::list`].
pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// A document to upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub owner: OwnerId,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
    /// Run the preprocessor before encoding.
    pub preprocess: bool,
}

impl UploadRequest {
    pub fn new(owner: OwnerId, file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            owner,
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
            preprocess: true,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn without_preprocessing(mut self) -> Self {
        self.preprocess = false;
        self
    }
}

/// One fragment as it currently sits in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSummary {
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub size: usize,
}

/// A registry record alongside its stored fragments.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub record: DocumentRecord,
    /// Sorted by index; duplicates and strays are included as found.
    pub fragments: Vec<FragmentSummary>,
}

/// Ties the registry, the fragment store and the chunking pipeline together.
pub struct ContentService {
    metadata: Arc<dyn MetadataStore>,
    store: Arc<dyn FragmentStore>,
    writer: ChunkWriter,
    reader: ChunkReader,
    preprocessor: Arc<dyn Preprocessor>,
    inline_threshold: usize,
}

impl ContentService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        store: Arc<dyn FragmentStore>,
        config: &AppConfig,
    ) -> Self {
        let preprocessor: Arc<dyn Preprocessor> = if config.preprocess.enabled {
            Arc::new(ImagePreprocessor::from_config(&config.preprocess))
        } else {
            Arc::new(PassThrough)
        };
        Self {
            writer: ChunkWriter::new(store.clone(), config.chunking.clone()),
            reader: ChunkReader::new(store.clone(), config.chunking.clone()),
            metadata,
            store,
            preprocessor,
            inline_threshold: config.inline_threshold,
        }
    }

    /// Validate `config` and open the configured registry and fragment store.
    pub async fn from_config(config: &AppConfig) -> Result<Self, ContentError> {
        config.validate().map_err(ContentError::Config)?;
        let store =
            quire_storage::from_config(&config.storage, config.chunking.record_size_ceiling).await?;
        let metadata = quire_metadata::from_config(&config.metadata).await?;
        Ok(Self::new(metadata, store, config))
    }

    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn Preprocessor>) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub async fn upload(&self, request: UploadRequest) -> Result<DocumentRecord, ContentError> {
        self.upload_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Register, encode and store a document, returning its ready record.
    ///
    /// If the upload does not complete, including on cancellation, the record
    /// is left in the `failed` state and the causing error is returned.
    #[instrument(
        skip(self, request, cancel),
        fields(owner = %request.owner, file_name = %request.file_name, input_len = request.data.len())
    )]
    pub async fn upload_with_cancel(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<DocumentRecord, ContentError> {
        let record = DocumentRecord::pending(
            request.owner.clone(),
            request.file_name.clone(),
            request.content_type.clone(),
        );
        let document_id = record.id;
        self.metadata.create_document(&DocumentRow::from(&record)).await?;

        let data = if request.preprocess {
            match self
                .preprocessor
                .preprocess(request.data.clone(), request.content_type.as_deref())
                .await
            {
                Ok(reduced) => reduced,
                Err(e) => {
                    warn!(%document_id, error = %e, "preprocessing failed, storing original payload");
                    request.data.clone()
                }
            }
        } else {
            request.data.clone()
        };

        if cancel.is_cancelled() {
            self.mark_failed(document_id).await;
            return Err(ChunkWriteError::Cancelled { document_id }.into());
        }

        let payload = EncodedPayload::from_raw(&data);
        let payload_hash = payload.digest();
        let encoded_size = payload.len() as u64;

        let inline = payload.is_empty() || payload.len() <= self.inline_threshold;
        let (chunk_count, inline_content) = if inline {
            (0, Some(payload.into_string()))
        } else {
            match self
                .writer
                .write_with_cancel(document_id, &request.owner, &payload, cancel)
                .await
            {
                Ok(count) => (count, None),
                Err(e) => {
                    self.mark_failed(document_id).await;
                    return Err(e.into());
                }
            }
        };

        let commit = ReadyCommit {
            chunk_count,
            raw_size: data.len() as u64,
            encoded_size,
            payload_hash,
            inline_content,
        };
        if let Err(e) = self
            .metadata
            .mark_ready(*document_id.as_uuid(), &commit, OffsetDateTime::now_utc())
            .await
        {
            // Fragments without a ready record are unreachable; remove them.
            if chunk_count > 0
                && let Err(cleanup) = self.store.delete_all(document_id).await
            {
                warn!(%document_id, error = %cleanup, "could not remove fragments of uncommitted document");
            }
            self.mark_failed(document_id).await;
            return Err(e.into());
        }

        info!(%document_id, chunk_count, encoded_size, "document uploaded");
        self.record(document_id).await
    }

    /// Move a pending record to `failed`. A registry error here is logged and
    /// does not replace the error that caused the failure.
    async fn mark_failed(&self, document_id: DocumentId) {
        if let Err(e) = self
            .metadata
            .mark_failed(*document_id.as_uuid(), OffsetDateTime::now_utc())
            .await
        {
            warn!(%document_id, error = %e, "could not mark document failed");
        }
    }

    /// Return the stored bytes of a ready document, verified against its digest.
    #[instrument(skip(self))]
    pub async fn download(&self, document_id: DocumentId) -> Result<Bytes, ContentError> {
        let record = self.record(document_id).await?;
        if !record.state.is_readable() {
            return Err(ContentError::NotReady {
                document_id,
                state: record.state,
            });
        }
        let payload_hash = record.payload_hash.ok_or_else(|| ContentError::MissingContent {
            document_id,
            reason: "no payload digest recorded".to_string(),
        })?;

        let payload = match record.chunk_count {
            Some(count) if count > 0 => self.reader.read_chunked(document_id, count).await?,
            Some(_) => {
                let inline = record.inline_content.ok_or_else(|| ContentError::MissingContent {
                    document_id,
                    reason: "inline document without inline content".to_string(),
                })?;
                EncodedPayload::parse(inline)?
            }
            None => {
                return Err(ContentError::MissingContent {
                    document_id,
                    reason: "no fragment count recorded".to_string(),
                });
            }
        };

        payload_hash.verify(payload.as_str().as_bytes())?;
        Ok(Bytes::from(payload.decode()?))
    }

    /// Delete a document's fragments, then its registry record. Returns the
    /// number of fragments removed.
    #[instrument(skip(self))]
    pub async fn delete(&self, document_id: DocumentId) -> Result<u64, ContentError> {
        self.record(document_id).await?;
        let removed = self.store.delete_all(document_id).await?;
        self.metadata.delete_document(*document_id.as_uuid()).await?;
        info!(removed, "document deleted");
        Ok(removed)
    }

    pub async fn inspect(&self, document_id: DocumentId) -> Result<Inspection, ContentError> {
        let record = self.record(document_id).await?;
        let mut fragments: Vec<FragmentSummary> = self
            .store
            .query_all(document_id)
            .await?
            .iter()
            .map(|f| FragmentSummary {
                chunk_index: f.chunk_index,
                total_chunks: f.total_chunks,
                size: f.size(),
            })
            .collect();
        fragments.sort_by_key(|f| f.chunk_index);
        Ok(Inspection { record, fragments })
    }

    pub async fn list(&self, owner: &OwnerId, limit: u32) -> Result<Vec<DocumentRecord>, ContentError> {
        self.metadata
            .list_documents(owner.as_str(), limit)
            .await?
            .into_iter()
            .map(|row| DocumentRecord::try_from(row).map_err(ContentError::from))
            .collect()
    }

    pub async fn record(&self, document_id: DocumentId) -> Result<DocumentRecord, ContentError> {
        let row = self
            .metadata
            .get_document(*document_id.as_uuid())
            .await?
            .ok_or(ContentError::NotFound(document_id))?;
        Ok(DocumentRecord::try_from(row)?)
    }

    /// Check that both the registry and the fragment store are reachable.
    pub async fn health_check(&self) -> Result<(), ContentError> {
        self.metadata.health_check().await?;
        self.store.health_check().await?;
        Ok(())
    }
}
