//! Core domain types and shared logic for Quire chunked content storage.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Logical documents and their lifecycle state
//! - Fragments (bounded slices of an encoded payload)
//! - Encoded payloads and content digests
//! - Fragment count estimation
//! - Configuration shared by the storage, registry and chunking layers

pub mod config;
pub mod document;
pub mod encoding;
pub mod error;
pub mod estimate;
pub mod fragment;
pub mod hash;

pub use document::{DocumentId, DocumentRecord, DocumentState, OwnerId};
pub use encoding::EncodedPayload;
pub use error::{Error, Result};
pub use estimate::{encoded_len, estimate_fragment_count};
pub use fragment::{Fragment, fragment_count, fragment_windows};
pub use hash::ContentHash;

/// Default maximum fragment content size: 800,000 bytes.
///
/// Leaves headroom below [`RECORD_SIZE_CEILING`] for the fragment's metadata fields.
pub const DEFAULT_MAX_FRAGMENT_SIZE: usize = 800_000;

/// Hard per-record size ceiling of the backing record store: 1 MiB.
pub const RECORD_SIZE_CEILING: usize = 1024 * 1024;

/// Bytes reserved per record for identifiers, counters and timestamps.
pub const FRAGMENT_METADATA_OVERHEAD: usize = 16 * 1024;

/// Default number of in-flight fragment reads.
pub const DEFAULT_READ_CONCURRENCY: usize = 8;

/// Default ceiling on the fragment count of a single document.
pub const DEFAULT_MAX_FRAGMENTS_PER_DOCUMENT: u32 = 65_536;

/// Upper bound for any configured I/O concurrency.
pub const MAX_CONCURRENCY: usize = 64;
