//! Document reconstruction from stored fragments.

use crate::error::{ChunkReconstructionError, MAX_REPORTED_INDICES};
use crate::retry::with_retry;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use quire_core::config::{ChunkingConfig, ReadStrategy};
use quire_core::{DocumentId, EncodedPayload, Fragment, MAX_CONCURRENCY};
use quire_storage::{FragmentStore, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Outcome of a single per-index lookup.
enum Lookup {
    Found(Fragment),
    Absent,
    Ambiguous { chunk_index: u32, matches: usize },
}

/// Reassembles encoded payloads from their fragments.
///
/// Reads have no side effects and may be repeated freely. Any structural
/// inconsistency fails the read; a partial payload is never returned.
#[derive(Clone)]
pub struct ChunkReader {
    store: Arc<dyn FragmentStore>,
    config: ChunkingConfig,
}

impl ChunkReader {
    pub fn new(store: Arc<dyn FragmentStore>, config: ChunkingConfig) -> Self {
        Self { store, config }
    }

    /// Reconstruct the payload of a document stored as `chunk_count` fragments.
    pub async fn read_chunked(
        &self,
        document_id: DocumentId,
        chunk_count: u32,
    ) -> Result<EncodedPayload, ChunkReconstructionError> {
        self.read_with_cancel(document_id, chunk_count, &CancellationToken::new())
            .await
    }

    #[instrument(skip(self, cancel), fields(strategy = ?self.config.read_strategy))]
    pub async fn read_with_cancel(
        &self,
        document_id: DocumentId,
        chunk_count: u32,
        cancel: &CancellationToken,
    ) -> Result<EncodedPayload, ChunkReconstructionError> {
        if chunk_count == 0 {
            return Ok(EncodedPayload::from_raw(b""));
        }
        if chunk_count > self.config.max_fragments_per_document {
            return Err(ChunkReconstructionError::CountOutOfRange {
                document_id,
                chunk_count,
                limit: self.config.max_fragments_per_document,
            });
        }

        let fetch = async {
            match self.config.read_strategy {
                ReadStrategy::PerIndex => self.fetch_per_index(document_id, chunk_count).await,
                ReadStrategy::RangeQuery => self.fetch_range(document_id).await,
            }
        };
        let fragments = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChunkReconstructionError::Cancelled { document_id }),
            result = fetch => result?,
        };

        let payload = assemble(document_id, chunk_count, fragments).inspect_err(|e| {
            warn!(error = %e, "document reconstruction failed");
        })?;
        debug!(encoded_len = payload.len(), "document reconstructed");
        Ok(payload)
    }

    /// One lookup per expected index, at most `read_concurrency` in flight.
    ///
    /// An index the store reports as ambiguous fails the read as a duplicate
    /// once every lookup has finished.
    async fn fetch_per_index(
        &self,
        document_id: DocumentId,
        chunk_count: u32,
    ) -> Result<Vec<Fragment>, ChunkReconstructionError> {
        let parallel = self.config.read_concurrency.clamp(1, MAX_CONCURRENCY);
        let mut fragments = Vec::with_capacity((chunk_count as usize).min(parallel));
        let mut ambiguous: BTreeMap<u32, usize> = BTreeMap::new();
        let mut in_flight = FuturesUnordered::new();

        let mut collect = |lookup: Lookup| match lookup {
            Lookup::Found(fragment) => fragments.push(fragment),
            Lookup::Absent => {}
            Lookup::Ambiguous {
                chunk_index,
                matches,
            } => {
                ambiguous.insert(chunk_index, matches);
            }
        };

        for chunk_index in 0..chunk_count {
            in_flight.push(self.fetch_one(document_id, chunk_index));

            if in_flight.len() >= parallel
                && let Some(result) = in_flight.next().await
            {
                collect(result?);
            }
        }

        while let Some(result) = in_flight.next().await {
            collect(result?);
        }

        if ambiguous.is_empty() {
            return Ok(fragments);
        }
        let present: BTreeSet<u32> = fragments
            .iter()
            .map(|f| f.chunk_index)
            .chain(ambiguous.keys().copied())
            .collect();
        Err(ChunkReconstructionError::Incomplete {
            document_id,
            expected: chunk_count,
            found: fragments.len() + ambiguous.values().sum::<usize>(),
            missing: missing_indices(chunk_count, |i| present.contains(&i)),
            missing_total: chunk_count - present.len() as u32,
            duplicates: ambiguous.into_keys().collect(),
            unexpected: Vec::new(),
        })
    }

    async fn fetch_one(
        &self,
        document_id: DocumentId,
        chunk_index: u32,
    ) -> Result<Lookup, ChunkReconstructionError> {
        match with_retry(&self.config.retry, || {
            self.store.get_by_index(document_id, chunk_index)
        })
        .await
        {
            Ok(Some(fragment)) => Ok(Lookup::Found(fragment)),
            Ok(None) => Ok(Lookup::Absent),
            Err(e) => match e.source {
                StoreError::Ambiguous { matches, .. } => Ok(Lookup::Ambiguous {
                    chunk_index,
                    matches,
                }),
                source => Err(ChunkReconstructionError::Store {
                    document_id,
                    chunk_index: Some(chunk_index),
                    attempts: e.attempts,
                    source,
                }),
            },
        }
    }

    async fn fetch_range(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<Fragment>, ChunkReconstructionError> {
        with_retry(&self.config.retry, || self.store.query_all(document_id))
            .await
            .map_err(|e| ChunkReconstructionError::Store {
                document_id,
                chunk_index: None,
                attempts: e.attempts,
                source: e.source,
            })
    }
}

/// Verify a retrieved fragment set and concatenate it in index order.
///
/// The set must hold exactly one fragment for each index in `0..chunk_count`,
/// and every fragment must agree that the document has `chunk_count` fragments.
pub fn assemble(
    document_id: DocumentId,
    chunk_count: u32,
    mut fragments: Vec<Fragment>,
) -> Result<EncodedPayload, ChunkReconstructionError> {
    if let Some(stray) = fragments.iter().find(|f| f.document_id != document_id) {
        return Err(ChunkReconstructionError::Corrupt {
            document_id,
            reason: format!(
                "fragment {} belongs to document {}",
                stray.chunk_index, stray.document_id
            ),
        });
    }

    fragments.sort_by_key(|f| f.chunk_index);

    let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
    let mut unexpected = Vec::new();
    for fragment in &fragments {
        if fragment.chunk_index < chunk_count {
            *seen.entry(fragment.chunk_index).or_default() += 1;
        } else if unexpected.last() != Some(&fragment.chunk_index) {
            unexpected.push(fragment.chunk_index);
        }
    }
    let duplicates: Vec<u32> = seen
        .iter()
        .filter(|&(_, &n)| n > 1)
        .map(|(&index, _)| index)
        .collect();

    if fragments.len() != chunk_count as usize || !duplicates.is_empty() || !unexpected.is_empty() {
        return Err(ChunkReconstructionError::Incomplete {
            document_id,
            expected: chunk_count,
            found: fragments.len(),
            missing: missing_indices(chunk_count, |i| seen.contains_key(&i)),
            missing_total: chunk_count - seen.len() as u32,
            duplicates,
            unexpected,
        });
    }

    if let Some(mismatch) = fragments.iter().find(|f| f.total_chunks != chunk_count) {
        return Err(ChunkReconstructionError::TotalMismatch {
            document_id,
            chunk_index: mismatch.chunk_index,
            expected: chunk_count,
            recorded: mismatch.total_chunks,
        });
    }

    let mut text = String::with_capacity(fragments.iter().map(Fragment::size).sum());
    for fragment in &fragments {
        text.push_str(&fragment.content);
    }
    EncodedPayload::parse(text).map_err(|e| ChunkReconstructionError::Corrupt {
        document_id,
        reason: e.to_string(),
    })
}

/// The lowest indices in `0..chunk_count` that are not present.
fn missing_indices(chunk_count: u32, present: impl Fn(u32) -> bool) -> Vec<u32> {
    (0..chunk_count)
        .filter(|&i| !present(i))
        .take(MAX_REPORTED_INDICES)
        .collect()
}
