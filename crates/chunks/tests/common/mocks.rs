//! Fragment stores with injected failures, delays and stalls.

use async_trait::async_trait;
use quire_core::{DocumentId, Fragment};
use quire_storage::{FragmentStore, MemoryStore, StoreError, StoreResult};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Memory store that fails on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    transient_put_failures: AtomicU32,
    transient_get_failures: AtomicU32,
    permanent_failure_at: Option<u32>,
    fail_deletes: bool,
    pub put_calls: AtomicU32,
    pub get_calls: AtomicU32,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` puts fail with a transient error.
    pub fn with_transient_put_failures(self, n: u32) -> Self {
        self.transient_put_failures.store(n, Ordering::SeqCst);
        self
    }

    /// The next `n` reads fail with a transient error.
    pub fn with_transient_get_failures(self, n: u32) -> Self {
        self.transient_get_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Every put of `chunk_index` fails with a non-transient error.
    pub fn with_permanent_failure_at(mut self, chunk_index: u32) -> Self {
        self.permanent_failure_at = Some(chunk_index);
        self
    }

    pub fn with_failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl FragmentStore for FlakyStore {
    async fn put(&self, fragment: &Fragment) -> StoreResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.permanent_failure_at == Some(fragment.chunk_index) {
            return Err(StoreError::Corrupt {
                key: format!("{}/{}", fragment.document_id, fragment.chunk_index),
                reason: "injected permanent failure".to_string(),
            });
        }
        if Self::take_failure(&self.transient_put_failures) {
            return Err(StoreError::Unavailable("injected transient failure".to_string()));
        }
        self.inner.put(fragment).await
    }

    async fn get_by_index(
        &self,
        document_id: DocumentId,
        chunk_index: u32,
    ) -> StoreResult<Option<Fragment>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.transient_get_failures) {
            return Err(StoreError::Unavailable("injected transient failure".to_string()));
        }
        self.inner.get_by_index(document_id, chunk_index).await
    }

    async fn query_all(&self, document_id: DocumentId) -> StoreResult<Vec<Fragment>> {
        self.inner.query_all(document_id).await
    }

    async fn delete_all(&self, document_id: DocumentId) -> StoreResult<u64> {
        if self.fail_deletes {
            return Err(StoreError::Corrupt {
                key: document_id.to_string(),
                reason: "injected delete failure".to_string(),
            });
        }
        self.inner.delete_all(document_id).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }

    fn record_size_ceiling(&self) -> usize {
        self.inner.record_size_ceiling()
    }
}

/// Memory store that records the peak number of concurrent operations.
pub struct InstrumentedStore {
    pub inner: MemoryStore,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl InstrumentedStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::default(),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn reset_peak(&self) {
        self.max_in_flight.store(0, Ordering::SeqCst);
    }

    async fn tracked<T>(&self, op: impl std::future::Future<Output = T>) -> T {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = op.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl FragmentStore for InstrumentedStore {
    async fn put(&self, fragment: &Fragment) -> StoreResult<()> {
        self.tracked(self.inner.put(fragment)).await
    }

    async fn get_by_index(
        &self,
        document_id: DocumentId,
        chunk_index: u32,
    ) -> StoreResult<Option<Fragment>> {
        self.tracked(self.inner.get_by_index(document_id, chunk_index))
            .await
    }

    async fn query_all(&self, document_id: DocumentId) -> StoreResult<Vec<Fragment>> {
        self.inner.query_all(document_id).await
    }

    async fn delete_all(&self, document_id: DocumentId) -> StoreResult<u64> {
        self.inner.delete_all(document_id).await
    }

    fn backend_name(&self) -> &'static str {
        "instrumented"
    }

    fn record_size_ceiling(&self) -> usize {
        self.inner.record_size_ceiling()
    }
}

/// Memory store whose operations never complete from a given index on.
#[derive(Default)]
pub struct StallingStore {
    pub inner: MemoryStore,
    pub stall_from: u32,
}

impl StallingStore {
    pub fn new(stall_from: u32) -> Self {
        Self {
            inner: MemoryStore::default(),
            stall_from,
        }
    }
}

#[async_trait]
impl FragmentStore for StallingStore {
    async fn put(&self, fragment: &Fragment) -> StoreResult<()> {
        if fragment.chunk_index >= self.stall_from {
            std::future::pending::<()>().await;
        }
        self.inner.put(fragment).await
    }

    async fn get_by_index(
        &self,
        document_id: DocumentId,
        chunk_index: u32,
    ) -> StoreResult<Option<Fragment>> {
        if chunk_index >= self.stall_from {
            std::future::pending::<()>().await;
        }
        self.inner.get_by_index(document_id, chunk_index).await
    }

    async fn query_all(&self, document_id: DocumentId) -> StoreResult<Vec<Fragment>> {
        self.inner.query_all(document_id).await
    }

    async fn delete_all(&self, document_id: DocumentId) -> StoreResult<u64> {
        self.inner.delete_all(document_id).await
    }

    fn backend_name(&self) -> &'static str {
        "stalling"
    }

    fn record_size_ceiling(&self) -> usize {
        self.inner.record_size_ceiling()
    }
}
