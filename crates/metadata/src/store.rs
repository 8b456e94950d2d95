//! Metadata store trait and implementations.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::DocumentRepo;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: DocumentRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the registry at `path`. `:memory:` gives an ephemeral registry.
    pub async fn new(path: impl AsRef<Path>, busy_timeout_secs: u64) -> MetadataResult<Self> {
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
            .busy_timeout(Duration::from_secs(busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection also
            // keeps `:memory:` registries shared across queries.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::{DocumentRow, ReadyCommit};
    use time::OffsetDateTime;
    use tracing::instrument;
    use uuid::Uuid;

    impl SqliteStore {
        /// Explain why a conditional `pending -> to` update touched no rows.
        async fn transition_failure(&self, document_id: Uuid, to: &str) -> MetadataError {
            let state: Result<Option<String>, _> =
                sqlx::query_scalar("SELECT state FROM documents WHERE document_id = ?")
                    .bind(document_id)
                    .fetch_optional(&self.pool)
                    .await;
            match state {
                Ok(Some(from)) => MetadataError::InvalidStateTransition {
                    from,
                    to: to.to_string(),
                },
                Ok(None) => MetadataError::NotFound(format!("document {document_id}")),
                Err(e) => MetadataError::Database(e),
            }
        }
    }

    #[async_trait]
    impl DocumentRepo for SqliteStore {
        #[instrument(skip(self, document), fields(document_id = %document.document_id))]
        async fn create_document(&self, document: &DocumentRow) -> MetadataResult<()> {
            let result = sqlx::query(
                r#"
                INSERT INTO documents (document_id, owner_id, file_name, content_type, raw_size,
                                       encoded_size, chunk_count, payload_hash, state,
                                       inline_content, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(document.document_id)
            .bind(&document.owner_id)
            .bind(&document.file_name)
            .bind(&document.content_type)
            .bind(document.raw_size)
            .bind(document.encoded_size)
            .bind(document.chunk_count)
            .bind(&document.payload_hash)
            .bind(&document.state)
            .bind(&document.inline_content)
            .bind(document.created_at)
            .bind(document.updated_at)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                    MetadataError::AlreadyExists(format!("document {}", document.document_id)),
                ),
                Err(e) => Err(MetadataError::Database(e)),
            }
        }

        async fn get_document(&self, document_id: Uuid) -> MetadataResult<Option<DocumentRow>> {
            let row = sqlx::query_as::<_, DocumentRow>(
                "SELECT * FROM documents WHERE document_id = ?",
            )
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_documents(
            &self,
            owner_id: &str,
            limit: u32,
        ) -> MetadataResult<Vec<DocumentRow>> {
            let rows = sqlx::query_as::<_, DocumentRow>(
                r#"
                SELECT * FROM documents
                WHERE owner_id = ?
                ORDER BY created_at DESC, document_id
                LIMIT ?
                "#,
            )
            .bind(owner_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        #[instrument(skip(self, commit), fields(chunk_count = commit.chunk_count))]
        async fn mark_ready(
            &self,
            document_id: Uuid,
            commit: &ReadyCommit,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                r#"
                UPDATE documents
                SET state = 'ready', chunk_count = ?, raw_size = ?, encoded_size = ?,
                    payload_hash = ?, inline_content = ?, updated_at = ?
                WHERE document_id = ? AND state = 'pending'
                "#,
            )
            .bind(i64::from(commit.chunk_count))
            .bind(i64::try_from(commit.raw_size).unwrap_or(i64::MAX))
            .bind(i64::try_from(commit.encoded_size).unwrap_or(i64::MAX))
            .bind(commit.payload_hash.to_hex())
            .bind(&commit.inline_content)
            .bind(updated_at)
            .bind(document_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(self.transition_failure(document_id, "ready").await);
            }
            Ok(())
        }

        #[instrument(skip(self))]
        async fn mark_failed(
            &self,
            document_id: Uuid,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE documents SET state = 'failed', updated_at = ? WHERE document_id = ? AND state = 'pending'",
            )
            .bind(updated_at)
            .bind(document_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(self.transition_failure(document_id, "failed").await);
            }
            Ok(())
        }

        #[instrument(skip(self))]
        async fn delete_document(&self, document_id: Uuid) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM documents WHERE document_id = ?")
                .bind(document_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("document {document_id}")));
            }
            Ok(())
        }
    }
}

/// SQL schema for the document registry.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    document_id BLOB PRIMARY KEY,
    owner_id TEXT NOT NULL,
    file_name TEXT NOT NULL,
    content_type TEXT,
    raw_size INTEGER NOT NULL,
    encoded_size INTEGER NOT NULL,
    chunk_count INTEGER,
    payload_hash TEXT,
    state TEXT NOT NULL CHECK (state IN ('pending', 'ready', 'failed')),
    inline_content TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id, created_at);
"#;
