//! Content fingerprints.
//!
//! SHA-256 over raw bytes, rendered as `sha256:<64 lowercase hex>`.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AuditError, AuditResult};

const PREFIX: &str = "sha256:";

/// A SHA-256 content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash arbitrary data.
    #[must_use]
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Lowercase hex without the algorithm prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse `sha256:<hex>` or bare hex.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidFingerprint`] unless the input is 64 hex digits.
    pub fn parse(s: &str) -> AuditResult<Self> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix(PREFIX).unwrap_or(trimmed);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| AuditError::InvalidFingerprint(format!("{trimmed}: {e}")))?;
        Ok(Self(bytes))
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Fingerprint a file, or `None` if it does not exist.
///
/// # Errors
///
/// Returns any IO error other than not-found.
pub fn fingerprint_file(path: &Path) -> std::io::Result<Option<ContentHash>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(ContentHash::hash(&bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "ContentHash({})", hex.get(..16).unwrap_or(&hex))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
