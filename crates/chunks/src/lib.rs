//! Chunked storage of large documents.
//!
//! Documents whose encoded payload exceeds the backing store's per-record
//! ceiling are split into fragments by [`ChunkWriter`] and reassembled by
//! [`ChunkReader`]. [`ContentService`] adds the registry lifecycle on top:
//! preprocessing, inline storage for small payloads, digest verification.

pub mod error;
pub mod preprocess;
pub mod reader;
mod retry;
pub mod service;
pub mod writer;

pub use error::{
    ChunkReconstructionError, ChunkWriteError, ContentError, MAX_REPORTED_INDICES, PreprocessingError,
};
pub use preprocess::{ImagePreprocessor, PassThrough, Preprocessor};
pub use reader::{ChunkReader, assemble};
pub use service::{ContentService, DEFAULT_LIST_LIMIT, FragmentSummary, Inspection, UploadRequest};
pub use writer::ChunkWriter;
