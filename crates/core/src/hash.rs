//! SHA-256 digests of encoded payloads.
//!
//! The registry records the digest of a document's encoded payload at commit
//! time; downloads recompute it over the reassembled text.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Fail with [`crate::Error::HashMismatch`] unless `data` hashes to `self`.
    pub fn verify(&self, data: &[u8]) -> crate::Result<()> {
        let actual = Self::compute(data);
        if actual == *self {
            Ok(())
        } else {
            Err(crate::Error::HashMismatch {
                expected: self.to_hex(),
                actual: actual.to_hex(),
            })
        }
    }

    /// Parse the 64-character lowercase or uppercase hex form.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != 64 || !s.is_ascii() {
            return Err(crate::Error::InvalidHash(format!(
                "expected 64 hex chars, got {:?}",
                s
            )));
        }
        let mut bytes = [0u8; 32];
        for (byte, pair) in bytes.iter_mut().zip(s.as_bytes().chunks_exact(2)) {
            let digits = std::str::from_utf8(pair).unwrap_or_default();
            *byte = u8::from_str_radix(digits, 16)
                .map_err(|e| crate::Error::InvalidHash(format!("{digits:?}: {e}")))?;
        }
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}..)", &self.to_hex()[..12])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
