//! Database models mapping to the registry schema.

use crate::error::{MetadataError, MetadataResult};
use quire_core::{ContentHash, DocumentId, DocumentRecord, DocumentState, OwnerId};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Logical document record.
#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub document_id: Uuid,
    pub owner_id: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub raw_size: i64,
    pub encoded_size: i64,
    /// NULL until the content write is confirmed.
    pub chunk_count: Option<i64>,
    pub payload_hash: Option<String>,
    pub state: String,
    pub inline_content: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Values recorded when a document's content is confirmed written.
#[derive(Debug, Clone)]
pub struct ReadyCommit {
    pub chunk_count: u32,
    pub raw_size: u64,
    pub encoded_size: u64,
    pub payload_hash: ContentHash,
    /// Encoded payload when stored inline (`chunk_count == 0`).
    pub inline_content: Option<String>,
}

impl From<&DocumentRecord> for DocumentRow {
    fn from(record: &DocumentRecord) -> Self {
        Self {
            document_id: *record.id.as_uuid(),
            owner_id: record.owner.as_str().to_string(),
            file_name: record.file_name.clone(),
            content_type: record.content_type.clone(),
            raw_size: i64::try_from(record.raw_size).unwrap_or(i64::MAX),
            encoded_size: i64::try_from(record.encoded_size).unwrap_or(i64::MAX),
            chunk_count: record.chunk_count.map(i64::from),
            payload_hash: record.payload_hash.map(|h| h.to_hex()),
            state: record.state.as_str().to_string(),
            inline_content: record.inline_content.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl TryFrom<DocumentRow> for DocumentRecord {
    type Error = MetadataError;

    fn try_from(row: DocumentRow) -> MetadataResult<Self> {
        let document_id = row.document_id.to_string();
        let corrupt = |reason: String| MetadataError::CorruptRow {
            document_id: document_id.clone(),
            reason,
        };

        let chunk_count = row
            .chunk_count
            .map(|n| u32::try_from(n).map_err(|_| corrupt(format!("chunk_count {n} out of range"))))
            .transpose()?;
        let payload_hash = row
            .payload_hash
            .as_deref()
            .map(ContentHash::from_hex)
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;

        Ok(DocumentRecord {
            id: DocumentId::from_uuid(row.document_id),
            owner: OwnerId::new(row.owner_id).map_err(|e| corrupt(e.to_string()))?,
            file_name: row.file_name,
            content_type: row.content_type,
            raw_size: u64::try_from(row.raw_size).map_err(|_| corrupt("negative raw_size".into()))?,
            encoded_size: u64::try_from(row.encoded_size)
                .map_err(|_| corrupt("negative encoded_size".into()))?,
            chunk_count,
            payload_hash,
            state: DocumentState::parse(&row.state).map_err(|e| corrupt(e.to_string()))?,
            inline_content: row.inline_content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_record_roundtrip() {
        let mut record =
            DocumentRecord::pending(OwnerId::new("alice").unwrap(), "scan.png", Some("image/png".into()));
        record.chunk_count = Some(4);
        record.payload_hash = Some(ContentHash::compute(b"payload"));
        record.state = DocumentState::Ready;

        let row = DocumentRow::from(&record);
        assert_eq!(row.state, "ready");
        let back = DocumentRecord::try_from(row).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.chunk_count, Some(4));
        assert_eq!(back.payload_hash, record.payload_hash);
    }

    #[test]
    fn test_corrupt_state_rejected() {
        let record = DocumentRecord::pending(OwnerId::new("alice").unwrap(), "a", None);
        let mut row = DocumentRow::from(&record);
        row.state = "committing".to_string();
        assert!(matches!(
            DocumentRecord::try_from(row),
            Err(MetadataError::CorruptRow { .. })
        ));
    }
}
