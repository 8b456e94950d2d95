//! Fragments: bounded, independently stored slices of an encoded payload.

use crate::document::{DocumentId, OwnerId};
use crate::encoding::EncodedPayload;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// One stored piece of an encoded payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// The owning logical document.
    pub document_id: DocumentId,
    /// Position in the payload (0-indexed).
    pub chunk_index: u32,
    /// The fragment's own copy of the expected total count.
    pub total_chunks: u32,
    /// Contiguous slice of the encoded payload.
    pub content: String,
    /// Principal that created the document.
    pub owner_id: OwnerId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Fragment {
    pub fn new(
        document_id: DocumentId,
        owner_id: OwnerId,
        chunk_index: u32,
        total_chunks: u32,
        content: impl Into<String>,
    ) -> Self {
        Self {
            document_id,
            chunk_index,
            total_chunks,
            content: content.into(),
            owner_id,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Content length in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Whether this is the last fragment of its set.
    pub fn is_final(&self) -> bool {
        self.chunk_index + 1 == self.total_chunks
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("document_id", &self.document_id)
            .field("chunk_index", &self.chunk_index)
            .field("total_chunks", &self.total_chunks)
            .field("size", &self.content.len())
            .finish()
    }
}

/// Number of fragments needed for an encoded payload of `encoded_len` bytes.
pub fn fragment_count(encoded_len: usize, max_fragment_size: usize) -> crate::Result<u32> {
    if max_fragment_size == 0 {
        return Err(crate::Error::InvalidFragmentSize {
            size: 0,
            min: 1,
            max: crate::RECORD_SIZE_CEILING,
        });
    }
    u32::try_from(encoded_len.div_ceil(max_fragment_size)).map_err(|_| {
        crate::Error::TooManyFragments {
            encoded_len,
            max: u32::MAX,
        }
    })
}

/// Split a payload into `(chunk_index, window)` pairs of at most `max_fragment_size` bytes.
pub fn fragment_windows(
    payload: &EncodedPayload,
    max_fragment_size: usize,
) -> impl Iterator<Item = (u32, &str)> + '_ {
    let text = payload.as_str();
    let step = max_fragment_size.max(1);
    (0..text.len())
        .step_by(step)
        .enumerate()
        .map(move |(i, start)| {
            let end = (start + step).min(text.len());
            (i as u32, &text[start..end])
        })
}
