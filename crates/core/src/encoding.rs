//! Encoded payloads: the base64 text that is actually partitioned into fragments.

use crate::hash::ContentHash;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

/// A padded standard-alphabet base64 payload.
///
/// Every byte is ASCII, so any byte offset is also a character boundary and the
/// payload can be windowed without splitting a character.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    /// Encode raw bytes.
    pub fn from_raw(data: &[u8]) -> Self {
        Self(STANDARD.encode(data))
    }

    /// Validate an already-encoded payload.
    pub fn parse(encoded: impl Into<String>) -> crate::Result<Self> {
        let encoded = encoded.into();
        if let Some(pos) = encoded.bytes().position(|b| !is_base64_byte(b)) {
            return Err(crate::Error::InvalidPayload(format!(
                "byte {pos} is outside the base64 alphabet"
            )));
        }
        Ok(Self(encoded))
    }

    /// Decode back to the raw bytes.
    pub fn decode(&self) -> crate::Result<Vec<u8>> {
        STANDARD
            .decode(&self.0)
            .map_err(|e| crate::Error::InvalidPayload(e.to_string()))
    }

    /// Digest of the encoded text.
    pub fn digest(&self) -> ContentHash {
        ContentHash::compute(self.0.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedPayload")
            .field("len", &self.0.len())
            .finish()
    }
}

fn is_base64_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')
}
