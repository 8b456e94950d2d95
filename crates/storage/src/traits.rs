//! Storage trait definitions.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use quire_core::{DocumentId, Fragment};

/// Serialized bytes a record carries beyond its content and owner id.
pub const RECORD_FIXED_FIELDS: usize = 128;

/// Backing record store for fragments.
///
/// Each fragment is an independent record addressed by `(document_id, chunk_index)`.
/// Records are immutable: the chunking layer never rewrites a fragment in place.
#[async_trait]
pub trait FragmentStore: Send + Sync + 'static {
    /// Persist one fragment.
    async fn put(&self, fragment: &Fragment) -> StoreResult<()>;

    /// Fetch the fragment at `chunk_index`, if present.
    ///
    /// A store that can hold several records at one index returns
    /// [`StoreError::Ambiguous`] instead of picking one.
    async fn get_by_index(
        &self,
        document_id: DocumentId,
        chunk_index: u32,
    ) -> StoreResult<Option<Fragment>>;

    /// Fetch every fragment stored for a document, in no particular order.
    async fn query_all(&self, document_id: DocumentId) -> StoreResult<Vec<Fragment>>;

    /// Delete every fragment stored for a document, returning how many were removed.
    ///
    /// Deleting a document with no fragments is not an error.
    async fn delete_all(&self, document_id: DocumentId) -> StoreResult<u64>;

    /// Static identifier of the backend type (e.g. "sqlite", "filesystem").
    fn backend_name(&self) -> &'static str;

    /// The hard per-record size ceiling this store enforces.
    fn record_size_ceiling(&self) -> usize;

    /// Verify backend connectivity.
    ///
    /// The default implementation returns Ok(()).
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Display key of a fragment record, used in errors and logs.
pub fn record_key(document_id: DocumentId, chunk_index: u32) -> String {
    format!("{document_id}/{chunk_index}")
}

/// Approximate serialized size of a fragment record.
pub fn record_size(fragment: &Fragment) -> usize {
    fragment.content.len() + fragment.owner_id.as_str().len() + RECORD_FIXED_FIELDS
}

/// Reject records that would exceed the store's ceiling.
pub fn check_record_size(fragment: &Fragment, limit: usize) -> StoreResult<()> {
    let size = record_size(fragment);
    if size > limit {
        return Err(StoreError::RecordTooLarge {
            key: record_key(fragment.document_id, fragment.chunk_index),
            size,
            limit,
        });
    }
    Ok(())
}
