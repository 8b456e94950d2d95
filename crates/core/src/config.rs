//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How the reader retrieves a document's fragments.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadStrategy {
    /// One lookup per expected index, issued with bounded concurrency.
    #[default]
    PerIndex,
    /// A single query returning every fragment of the document.
    RangeQuery,
}

/// Retry policy for transient fragment I/O failures.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on a single backoff delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// No retries and no delay.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before retry number `retry` (1-based): 100ms, 200ms, 400ms, ... capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(20);
        let delay = self.initial_backoff_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

/// Chunking configuration for the writer and reader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum fragment content size in bytes.
    #[serde(default = "default_max_fragment_size")]
    pub max_fragment_size: usize,
    /// Hard per-record ceiling of the backing store.
    #[serde(default = "default_record_size_ceiling")]
    pub record_size_ceiling: usize,
    /// Maximum in-flight fragment reads.
    #[serde(default = "default_read_concurrency")]
    pub read_concurrency: usize,
    /// Maximum in-flight fragment writes (1 writes sequentially).
    #[serde(default = "default_write_concurrency")]
    pub write_concurrency: usize,
    /// Largest fragment count a document may be written or read with.
    #[serde(default = "default_max_fragments_per_document")]
    pub max_fragments_per_document: u32,
    #[serde(default)]
    pub read_strategy: ReadStrategy,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_fragment_size() -> usize {
    crate::DEFAULT_MAX_FRAGMENT_SIZE
}

fn default_record_size_ceiling() -> usize {
    crate::RECORD_SIZE_CEILING
}

fn default_read_concurrency() -> usize {
    crate::DEFAULT_READ_CONCURRENCY
}

fn default_write_concurrency() -> usize {
    1
}

fn default_max_fragments_per_document() -> u32 {
    crate::DEFAULT_MAX_FRAGMENTS_PER_DOCUMENT
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: default_max_fragment_size(),
            record_size_ceiling: default_record_size_ceiling(),
            read_concurrency: default_read_concurrency(),
            write_concurrency: default_write_concurrency(),
            max_fragments_per_document: default_max_fragments_per_document(),
            read_strategy: ReadStrategy::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ChunkingConfig {
    /// Configuration with a custom fragment size and the ceiling scaled to fit it.
    pub fn with_fragment_size(max_fragment_size: usize) -> Self {
        Self {
            max_fragment_size,
            record_size_ceiling: crate::RECORD_SIZE_CEILING
                .max(max_fragment_size + crate::FRAGMENT_METADATA_OVERHEAD),
            ..Self::default()
        }
    }

    /// Validate chunking configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_fragment_size == 0 {
            return Err("max_fragment_size must be greater than zero".to_string());
        }
        let needed = self
            .max_fragment_size
            .saturating_add(crate::FRAGMENT_METADATA_OVERHEAD);
        if needed > self.record_size_ceiling {
            return Err(format!(
                "max_fragment_size {} plus {} bytes of record overhead exceeds record_size_ceiling {}",
                self.max_fragment_size,
                crate::FRAGMENT_METADATA_OVERHEAD,
                self.record_size_ceiling
            ));
        }
        for (name, value) in [
            ("read_concurrency", self.read_concurrency),
            ("write_concurrency", self.write_concurrency),
        ] {
            if !(1..=crate::MAX_CONCURRENCY).contains(&value) {
                return Err(format!(
                    "{name} must be between 1 and {}, got {value}",
                    crate::MAX_CONCURRENCY
                ));
            }
        }
        if self.max_fragments_per_document == 0 {
            return Err("max_fragments_per_document must be greater than zero".to_string());
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err("retry.initial_backoff_ms must not exceed retry.max_backoff_ms".to_string());
        }
        Ok(())
    }
}

/// Fragment store backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process-local store (testing and one-shot tooling only).
    Memory,
    /// One JSON record per fragment under a root directory.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// SQLite table of fragments.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/fragments.db"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } | StorageConfig::Sqlite { path }
                if path.as_os_str().is_empty() =>
            {
                Err("storage path must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Document registry configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path (`:memory:` for an ephemeral registry).
        path: PathBuf,
        /// Busy timeout in seconds for lock contention.
        #[serde(default = "default_busy_timeout_secs")]
        busy_timeout_secs: u64,
    },
}

fn default_busy_timeout_secs() -> u64 {
    5
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/registry.db"),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { path, .. } if path.as_os_str().is_empty() => {
                Err("metadata path must not be empty".to_string())
            }
            MetadataConfig::Sqlite { .. } => Ok(()),
        }
    }
}

/// Image preprocessing configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Re-encode image payloads before chunking.
    #[serde(default = "default_preprocess_enabled")]
    pub enabled: bool,
    /// JPEG quality (1-100).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Longest allowed side in pixels; larger images are downscaled.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: Option<u32>,
}

fn default_preprocess_enabled() -> bool {
    true
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_max_dimension() -> Option<u32> {
    Some(2048)
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: default_preprocess_enabled(),
            jpeg_quality: default_jpeg_quality(),
            max_dimension: default_max_dimension(),
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            ));
        }
        if self.max_dimension == Some(0) {
            return Err("max_dimension must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    /// Encoded payloads up to this many bytes are stored inline in the
    /// registry instead of being chunked (0 disables inline storage).
    #[serde(default)]
    pub inline_threshold: usize,
}

impl AppConfig {
    /// Create a test configuration with in-memory storage and SQLite metadata.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            chunking: ChunkingConfig {
                retry: RetryConfig::none(),
                ..ChunkingConfig::default()
            },
            storage: StorageConfig::Memory,
            metadata: MetadataConfig::Sqlite {
                path: PathBuf::from(":memory:"),
                busy_timeout_secs: default_busy_timeout_secs(),
            },
            preprocess: PreprocessConfig::default(),
            inline_threshold: 0,
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.chunking.validate()?;
        self.storage.validate()?;
        self.metadata.validate()?;
        self.preprocess.validate()?;
        if self.inline_threshold > self.chunking.record_size_ceiling / 2 {
            return Err(format!(
                "inline_threshold {} must not exceed half the record ceiling ({})",
                self.inline_threshold,
                self.chunking.record_size_ceiling / 2
            ));
        }
        Ok(())
    }
}
