//! Logical document registry for Quire.
//!
//! The registry is the authority on a document's lifecycle and its confirmed
//! fragment count. Fragment content itself lives in `quire-storage`.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{DocumentRow, ReadyCommit};
pub use repos::DocumentRepo;
pub use store::{MetadataStore, SqliteStore};

use quire_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            busy_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *busy_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
