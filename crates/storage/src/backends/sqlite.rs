//! SQLite fragment store.

use crate::error::{StoreError, StoreResult};
use crate::traits::{FragmentStore, check_record_size, record_key};
use async_trait::async_trait;
use quire_core::{DocumentId, Fragment, OwnerId};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

/// Fragment row as stored.
#[derive(Debug, Clone, FromRow)]
struct FragmentRow {
    document_id: Uuid,
    chunk_index: i64,
    total_chunks: i64,
    content: String,
    owner_id: String,
    created_at: OffsetDateTime,
}

impl TryFrom<FragmentRow> for Fragment {
    type Error = StoreError;

    fn try_from(row: FragmentRow) -> StoreResult<Self> {
        let key = format!("{}/{}", row.document_id, row.chunk_index);
        let corrupt = |reason: String| StoreError::Corrupt {
            key: key.clone(),
            reason,
        };
        Ok(Fragment {
            document_id: DocumentId::from_uuid(row.document_id),
            chunk_index: u32::try_from(row.chunk_index)
                .map_err(|_| corrupt(format!("chunk_index {} out of range", row.chunk_index)))?,
            total_chunks: u32::try_from(row.total_chunks)
                .map_err(|_| corrupt(format!("total_chunks {} out of range", row.total_chunks)))?,
            content: row.content,
            owner_id: OwnerId::new(row.owner_id).map_err(|e| corrupt(e.to_string()))?,
            created_at: row.created_at,
        })
    }
}

/// SQLite-based fragment store.
pub struct SqliteFragmentStore {
    pool: Pool<Sqlite>,
    ceiling: usize,
}

impl SqliteFragmentStore {
    /// Open (or create) the fragment database at `path`.
    pub async fn new(path: impl AsRef<Path>, ceiling: usize) -> StoreResult<Self> {
        let path = path.as_ref();
        let in_memory = path.as_os_str() == ":memory:";

        if !in_memory
            && let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path.display())
        };
        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection keeps `:memory:` databases shared and avoids
            // persistent lock failures under concurrent writers.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool, ceiling };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the schema if missing.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl FragmentStore for SqliteFragmentStore {
    #[instrument(skip(self, fragment), fields(backend = "sqlite", document_id = %fragment.document_id, chunk_index = fragment.chunk_index))]
    async fn put(&self, fragment: &Fragment) -> StoreResult<()> {
        check_record_size(fragment, self.ceiling)?;
        let result = sqlx::query(
            r#"
            INSERT INTO fragments (document_id, chunk_index, total_chunks, content, owner_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(*fragment.document_id.as_uuid())
        .bind(i64::from(fragment.chunk_index))
        .bind(i64::from(fragment.total_chunks))
        .bind(&fragment.content)
        .bind(fragment.owner_id.as_str())
        .bind(fragment.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                StoreError::AlreadyExists(record_key(fragment.document_id, fragment.chunk_index)),
            ),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn get_by_index(
        &self,
        document_id: DocumentId,
        chunk_index: u32,
    ) -> StoreResult<Option<Fragment>> {
        let row = sqlx::query_as::<_, FragmentRow>(
            "SELECT * FROM fragments WHERE document_id = ? AND chunk_index = ?",
        )
        .bind(*document_id.as_uuid())
        .bind(i64::from(chunk_index))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Fragment::try_from).transpose()
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn query_all(&self, document_id: DocumentId) -> StoreResult<Vec<Fragment>> {
        let rows =
            sqlx::query_as::<_, FragmentRow>("SELECT * FROM fragments WHERE document_id = ?")
                .bind(*document_id.as_uuid())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Fragment::try_from).collect()
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn delete_all(&self, document_id: DocumentId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM fragments WHERE document_id = ?")
            .bind(*document_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn record_size_ceiling(&self) -> usize {
        self.ceiling
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// SQL schema for the fragment table.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS fragments (
    document_id BLOB NOT NULL,
    chunk_index INTEGER NOT NULL,
    total_chunks INTEGER NOT NULL,
    content TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (document_id, chunk_index)
);
"#;
