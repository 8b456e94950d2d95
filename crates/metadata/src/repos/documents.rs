//! Document registry repository.

use crate::error::MetadataResult;
use crate::models::{DocumentRow, ReadyCommit};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for logical document records.
#[async_trait]
pub trait DocumentRepo: Send + Sync {
    /// Register a new document. Fails with `AlreadyExists` if the id is taken.
    async fn create_document(&self, document: &DocumentRow) -> MetadataResult<()>;

    /// Get a document by ID.
    async fn get_document(&self, document_id: Uuid) -> MetadataResult<Option<DocumentRow>>;

    /// List an owner's documents, newest first.
    async fn list_documents(&self, owner_id: &str, limit: u32) -> MetadataResult<Vec<DocumentRow>>;

    /// Record a confirmed content write and transition `pending -> ready`.
    ///
    /// Fails with `InvalidStateTransition` if the document is not pending, and
    /// `NotFound` if it does not exist.
    async fn mark_ready(
        &self,
        document_id: Uuid,
        commit: &ReadyCommit,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Transition `pending -> failed`.
    async fn mark_failed(&self, document_id: Uuid, updated_at: OffsetDateTime)
    -> MetadataResult<()>;

    /// Remove a document record.
    async fn delete_document(&self, document_id: Uuid) -> MetadataResult<()>;
}
