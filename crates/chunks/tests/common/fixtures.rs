//! Deterministic payload generators.

use quire_core::EncodedPayload;
use quire_core::config::{ChunkingConfig, RetryConfig};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Pseudo-random bytes from a fixed seed.
pub fn seeded_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 33) as u8
        })
        .collect()
}

/// An encoded payload of exactly `len` characters.
pub fn encoded_of_len(len: usize) -> EncodedPayload {
    let text: String = seeded_bytes(len, len as u64)
        .into_iter()
        .map(|b| ALPHABET[usize::from(b) % ALPHABET.len()] as char)
        .collect();
    EncodedPayload::parse(text).unwrap()
}

/// Chunking config with a small fragment size and millisecond backoff.
pub fn small_fragments(max_fragment_size: usize) -> ChunkingConfig {
    ChunkingConfig {
        retry: fast_retry(3),
        ..ChunkingConfig::with_fragment_size(max_fragment_size)
    }
}

pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_backoff_ms: 1,
        max_backoff_ms: 4,
    }
}
