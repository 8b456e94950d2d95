//! Reconstruction behavior across backends and strategies.

mod common;

use common::fixtures::{encoded_of_len, seeded_bytes, small_fragments};
use common::mocks::{FlakyStore, InstrumentedStore, StallingStore};
use common::owner;
use quire_chunks::{ChunkReader, ChunkReconstructionError, ChunkWriter, MAX_REPORTED_INDICES};
use quire_core::config::{ChunkingConfig, ReadStrategy};
use quire_core::{DocumentId, EncodedPayload, Fragment};
use quire_storage::{FilesystemStore, FragmentStore, MemoryStore, SqliteFragmentStore};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const STRATEGIES: [ReadStrategy; 2] = [ReadStrategy::PerIndex, ReadStrategy::RangeQuery];

fn config(max: usize, strategy: ReadStrategy) -> ChunkingConfig {
    ChunkingConfig {
        read_strategy: strategy,
        ..small_fragments(max)
    }
}

async fn backends(temp: &TempDir) -> Vec<Arc<dyn FragmentStore>> {
    let ceiling = quire_core::RECORD_SIZE_CEILING;
    vec![
        Arc::new(MemoryStore::default()),
        Arc::new(
            FilesystemStore::new(temp.path().join("fs"), ceiling)
                .await
                .unwrap(),
        ),
        Arc::new(
            SqliteFragmentStore::new(temp.path().join("fragments.db"), ceiling)
                .await
                .unwrap(),
        ),
    ]
}

#[tokio::test]
async fn test_round_trip_every_backend_and_strategy() {
    let temp = TempDir::new().unwrap();
    for store in backends(&temp).await {
        for strategy in STRATEGIES {
            let doc = DocumentId::new();
            let raw = seeded_bytes(10_000, 3);
            let payload = EncodedPayload::from_raw(&raw);

            let writer = ChunkWriter::new(store.clone(), config(1000, strategy));
            let count = writer.write_chunked(doc, &owner(), &payload).await.unwrap();
            assert_eq!(count, 14);

            let reader = ChunkReader::new(store.clone(), config(1000, strategy));
            let restored = reader.read_chunked(doc, count).await.unwrap();
            assert_eq!(restored, payload, "{} / {strategy:?}", store.backend_name());
            assert_eq!(restored.decode().unwrap(), raw);
        }
    }
}

#[tokio::test]
async fn test_zero_count_reads_nothing() {
    let store = Arc::new(FlakyStore::new());
    let reader = ChunkReader::new(store.clone(), ChunkingConfig::default());
    let payload = reader.read_chunked(DocumentId::new(), 0).await.unwrap();
    assert!(payload.is_empty());
    assert_eq!(store.get_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_fragment_is_reported() {
    for strategy in STRATEGIES {
        let store = Arc::new(MemoryStore::default());
        let doc = DocumentId::new();
        ChunkWriter::new(store.clone(), config(16, strategy))
            .write_chunked(doc, &owner(), &encoded_of_len(64))
            .await
            .unwrap();
        assert!(store.remove(doc, 2).await);

        let reader = ChunkReader::new(store.clone(), config(16, strategy));
        match reader.read_chunked(doc, 4).await {
            Err(ChunkReconstructionError::Incomplete {
                document_id,
                expected,
                found,
                missing,
                ..
            }) => {
                assert_eq!(document_id, doc);
                assert_eq!((expected, found), (4, 3));
                assert_eq!(missing, vec![2]);
            }
            other => panic!("{strategy:?}: unexpected result {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_duplicate_fragment_is_reported() {
    for strategy in STRATEGIES {
        let store = Arc::new(MemoryStore::default());
        let doc = DocumentId::new();
        ChunkWriter::new(store.clone(), small_fragments(16))
            .write_chunked(doc, &owner(), &encoded_of_len(48))
            .await
            .unwrap();
        store
            .put(&Fragment::new(doc, owner(), 1, 3, "AAAAAAAAAAAAAAAA"))
            .await
            .unwrap();
        assert_eq!(store.query_all(doc).await.unwrap().len(), 4);

        let reader = ChunkReader::new(store.clone(), config(16, strategy));
        match reader.read_chunked(doc, 3).await {
            Err(ChunkReconstructionError::Incomplete {
                found,
                duplicates,
                missing_total,
                ..
            }) => {
                assert_eq!(found, 4, "{strategy:?}");
                assert_eq!(duplicates, vec![1], "{strategy:?}");
                assert_eq!(missing_total, 0, "{strategy:?}");
            }
            other => panic!("{strategy:?}: unexpected result {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_default_config_rejects_duplicate_index() {
    let store = Arc::new(MemoryStore::default());
    let doc = DocumentId::new();
    let payload = encoded_of_len(48);
    ChunkWriter::new(store.clone(), small_fragments(16))
        .write_chunked(doc, &owner(), &payload)
        .await
        .unwrap();
    let copy = store.get_by_index(doc, 1).await.unwrap().unwrap();
    store.put(&copy).await.unwrap();

    let reader = ChunkReader::new(store.clone(), small_fragments(16));
    assert!(matches!(
        reader.read_chunked(doc, 3).await,
        Err(ChunkReconstructionError::Incomplete { .. })
    ));
}

#[tokio::test]
async fn test_oversized_count_is_rejected_without_reading() {
    for strategy in STRATEGIES {
        let store = Arc::new(FlakyStore::new());
        let reader = ChunkReader::new(store.clone(), config(16, strategy));
        let doc = DocumentId::new();
        match reader.read_chunked(doc, u32::MAX).await {
            Err(ChunkReconstructionError::CountOutOfRange {
                document_id,
                chunk_count,
                limit,
            }) => {
                assert_eq!(document_id, doc);
                assert_eq!(chunk_count, u32::MAX);
                assert_eq!(limit, quire_core::DEFAULT_MAX_FRAGMENTS_PER_DOCUMENT);
            }
            other => panic!("{strategy:?}: unexpected result {other:?}"),
        }
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_large_count_over_small_set_reports_bounded_missing() {
    for strategy in STRATEGIES {
        let store = Arc::new(MemoryStore::default());
        let doc = DocumentId::new();
        ChunkWriter::new(store.clone(), small_fragments(16))
            .write_chunked(doc, &owner(), &encoded_of_len(16))
            .await
            .unwrap();

        let reader = ChunkReader::new(store.clone(), config(16, strategy));
        let limit = quire_core::DEFAULT_MAX_FRAGMENTS_PER_DOCUMENT;
        match reader.read_chunked(doc, limit).await {
            Err(ChunkReconstructionError::Incomplete {
                missing,
                missing_total,
                ..
            }) => {
                assert_eq!(missing_total, limit - 1);
                assert_eq!(missing.len(), MAX_REPORTED_INDICES);
            }
            other => panic!("{strategy:?}: unexpected result {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_reads_are_idempotent() {
    let store = Arc::new(MemoryStore::default());
    let doc = DocumentId::new();
    let payload = encoded_of_len(100);
    ChunkWriter::new(store.clone(), small_fragments(16))
        .write_chunked(doc, &owner(), &payload)
        .await
        .unwrap();

    let reader = ChunkReader::new(store.clone(), small_fragments(16));
    let first = reader.read_chunked(doc, 7).await.unwrap();
    let second = reader.read_chunked(doc, 7).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, payload);
    assert_eq!(store.len().await, 7);
}

#[tokio::test]
async fn test_transient_read_failures_are_retried() {
    let store = Arc::new(FlakyStore::new());
    let doc = DocumentId::new();
    let payload = encoded_of_len(64);
    ChunkWriter::new(store.clone(), small_fragments(16))
        .write_chunked(doc, &owner(), &payload)
        .await
        .unwrap();

    let flaky = Arc::new(FlakyStore::new().with_transient_get_failures(2));
    for fragment in store.inner.query_all(doc).await.unwrap() {
        flaky.inner.put(&fragment).await.unwrap();
    }
    let reader = ChunkReader::new(flaky.clone(), small_fragments(16));
    assert_eq!(reader.read_chunked(doc, 4).await.unwrap(), payload);
    assert_eq!(flaky.get_calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_read_concurrency_is_bounded() {
    let store = Arc::new(InstrumentedStore::new(Duration::from_millis(5)));
    let doc = DocumentId::new();
    let payload = encoded_of_len(200);
    ChunkWriter::new(store.clone(), small_fragments(10))
        .write_chunked(doc, &owner(), &payload)
        .await
        .unwrap();
    store.reset_peak();

    let reader = ChunkReader::new(
        store.clone(),
        ChunkingConfig {
            read_concurrency: 4,
            ..small_fragments(10)
        },
    );
    assert_eq!(reader.read_chunked(doc, 20).await.unwrap(), payload);
    assert!(store.peak() <= 4, "peak {}", store.peak());
    assert!(store.peak() >= 2, "reads never overlapped");
}

#[tokio::test]
async fn test_cancelled_read_returns_no_payload() {
    let store = Arc::new(StallingStore::new(1));
    let doc = DocumentId::new();
    for index in 0..3 {
        store
            .inner
            .put(&Fragment::new(doc, owner(), index, 3, "QUJD"))
            .await
            .unwrap();
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let reader = ChunkReader::new(store.clone(), ChunkingConfig::default());
    let result = reader.read_with_cancel(doc, 3, &cancel).await;
    assert!(matches!(result, Err(ChunkReconstructionError::Cancelled { .. })));
}
