//! Checksums for exported schema documents

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 checksum, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(data)))
    }

    /// Checksum of a JSON value in its compact rendering
    ///
    /// Object keys are emitted in sorted order, so equal values hash equally.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self::from_bytes(canonical.as_bytes())
    }

    /// Combined checksum over an ordered list of checksums
    pub fn combine<'a>(parts: impl IntoIterator<Item = &'a Checksum>) -> Self {
        let joined = parts
            .into_iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(",");
        Self::from_bytes(joined.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn verify_json(&self, value: &serde_json::Value) -> bool {
        *self == Self::from_json(value)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
