//! Error types for chunked writes, reconstruction and preprocessing.

use quire_core::{DocumentId, DocumentState};
use quire_metadata::MetadataError;
use quire_storage::StoreError;
use thiserror::Error;

/// Longest list of missing indices carried by [`ChunkReconstructionError::Incomplete`].
pub const MAX_REPORTED_INDICES: usize = 32;

/// A chunked write did not complete. Any fragments it stored have been removed
/// unless the error is [`ChunkWriteError::RollbackFailed`].
#[derive(Debug, Error)]
pub enum ChunkWriteError {
    #[error("fragments already exist for document {document_id}")]
    AlreadyWritten { document_id: DocumentId },

    #[error("invalid payload for document {document_id}: {source}")]
    InvalidPayload {
        document_id: DocumentId,
        #[source]
        source: quire_core::Error,
    },

    #[error("fragment {chunk_index} of document {document_id} failed after {attempts} attempt(s): {source}")]
    Store {
        document_id: DocumentId,
        chunk_index: u32,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("could not inspect existing fragments of document {document_id}: {source}")]
    Precheck {
        document_id: DocumentId,
        #[source]
        source: StoreError,
    },

    #[error("write of document {document_id} was cancelled")]
    Cancelled { document_id: DocumentId },

    #[error("rollback of document {document_id} failed after: {cause}")]
    RollbackFailed {
        document_id: DocumentId,
        cause: Box<ChunkWriteError>,
        #[source]
        source: StoreError,
    },
}

impl ChunkWriteError {
    pub fn document_id(&self) -> DocumentId {
        match self {
            Self::AlreadyWritten { document_id }
            | Self::InvalidPayload { document_id, .. }
            | Self::Store { document_id, .. }
            | Self::Precheck { document_id, .. }
            | Self::Cancelled { document_id }
            | Self::RollbackFailed { document_id, .. } => *document_id,
        }
    }
}

/// A document's fragments could not be reassembled. No partial payload is
/// ever returned alongside this error.
#[derive(Debug, Error)]
pub enum ChunkReconstructionError {
    #[error(
        "document {document_id}: expected {expected} fragments, found {found} \
         (missing {missing_total} {missing:?}, duplicate {duplicates:?}, out of range {unexpected:?})"
    )]
    Incomplete {
        document_id: DocumentId,
        expected: u32,
        found: usize,
        /// The lowest missing indices, at most [`MAX_REPORTED_INDICES`].
        missing: Vec<u32>,
        missing_total: u32,
        duplicates: Vec<u32>,
        unexpected: Vec<u32>,
    },

    #[error("document {document_id}: fragment count {chunk_count} exceeds the limit of {limit}")]
    CountOutOfRange {
        document_id: DocumentId,
        chunk_count: u32,
        limit: u32,
    },

    #[error("document {document_id}: fragment {chunk_index} records {recorded} total fragments, expected {expected}")]
    TotalMismatch {
        document_id: DocumentId,
        chunk_index: u32,
        expected: u32,
        recorded: u32,
    },

    #[error("document {document_id}: fragment {} read failed after {attempts} attempt(s): {source}", fmt_index(.chunk_index))]
    Store {
        document_id: DocumentId,
        chunk_index: Option<u32>,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("document {document_id}: corrupt fragment data: {reason}")]
    Corrupt {
        document_id: DocumentId,
        reason: String,
    },

    #[error("read of document {document_id} was cancelled")]
    Cancelled { document_id: DocumentId },
}

fn fmt_index(chunk_index: &Option<u32>) -> String {
    match chunk_index {
        Some(index) => index.to_string(),
        None => "query".to_string(),
    }
}

/// Payload reduction failed; callers fall back to the unmodified payload.
#[derive(Debug, Error)]
pub enum PreprocessingError {
    #[error("content declared as {content_type} is not a recognized image")]
    Unrecognized { content_type: String },

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("preprocessing task failed: {0}")]
    Task(String),
}

/// Errors from the document-level content service.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("document not found: {0}")]
    NotFound(DocumentId),

    #[error("document {document_id} is {state}, not readable")]
    NotReady {
        document_id: DocumentId,
        state: DocumentState,
    },

    #[error("document {document_id} has no stored content: {reason}")]
    MissingContent {
        document_id: DocumentId,
        reason: String,
    },

    #[error(transparent)]
    Write(#[from] ChunkWriteError),

    #[error(transparent)]
    Read(#[from] ChunkReconstructionError),

    #[error("registry error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] quire_core::Error),

    #[error("configuration error: {0}")]
    Config(String),
}
