//! Logical document identity and lifecycle.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum length of an owner identifier.
pub const MAX_OWNER_ID_LEN: usize = 128;

/// Unique identifier for a logical document.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generate a new random document ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidDocumentId(format!("{s}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the principal that created a document.
///
/// Carried on every fragment for external authorization; never interpreted here.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    /// Validate and wrap an owner identifier.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(crate::Error::InvalidOwner("owner id is empty".to_string()));
        }
        if id.len() > MAX_OWNER_ID_LEN {
            return Err(crate::Error::InvalidOwner(format!(
                "owner id is {} bytes (max {MAX_OWNER_ID_LEN})",
                id.len()
            )));
        }
        if id.chars().any(char::is_control) {
            return Err(crate::Error::InvalidOwner(
                "owner id contains control characters".to_string(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OwnerId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<OwnerId> for String {
    fn from(value: OwnerId) -> Self {
        value.0
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerId({})", self.0)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Document lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    /// Registered; content not yet committed.
    Pending,
    /// All fragments confirmed written and `chunk_count` recorded.
    Ready,
    /// The content write failed and was rolled back.
    Failed,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            other => Err(crate::Error::InvalidState(other.to_string())),
        }
    }

    /// Content can be read only once the document is ready.
    pub fn is_readable(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A logical document as tracked by the registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub owner: OwnerId,
    pub file_name: String,
    pub content_type: Option<String>,
    /// Size of the stored bytes before encoding (after any preprocessing).
    pub raw_size: u64,
    /// Length of the encoded payload.
    pub encoded_size: u64,
    /// Authoritative fragment count. `Some(0)` means the payload is stored inline.
    pub chunk_count: Option<u32>,
    /// Digest of the encoded payload.
    pub payload_hash: Option<ContentHash>,
    pub state: DocumentState,
    /// Encoded payload for documents stored inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_content: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl DocumentRecord {
    /// Create a pending record for a freshly reserved document.
    pub fn pending(owner: OwnerId, file_name: impl Into<String>, content_type: Option<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: DocumentId::new(),
            owner,
            file_name: file_name.into(),
            content_type,
            raw_size: 0,
            encoded_size: 0,
            chunk_count: None,
            payload_hash: None,
            state: DocumentState::Pending,
            inline_content: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the content lives in fragments rather than inline.
    pub fn is_chunked(&self) -> bool {
        matches!(self.chunk_count, Some(n) if n > 0)
    }
}
