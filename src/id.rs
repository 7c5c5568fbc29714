//! Record identifiers
//!
//! 12 bytes rendered as 24 lowercase hex characters: 4 bytes of big-endian
//! seconds since the epoch, 5 bytes unique to the process, 3 bytes of counter.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, SchemaError};

const COUNTER_MASK: u32 = 0x00ff_ffff;

/// Stable identifier of a stored record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

struct ProcessSeed {
    unique: [u8; 5],
    counter: AtomicU32,
}

fn seed() -> &'static ProcessSeed {
    static SEED: OnceLock<ProcessSeed> = OnceLock::new();
    SEED.get_or_init(|| {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(std::process::id().to_be_bytes());
        hasher.update(nanos.to_be_bytes());
        let digest = hasher.finalize();

        let mut unique = [0u8; 5];
        unique.copy_from_slice(&digest[..5]);
        let start = u32::from_be_bytes([0, digest[5], digest[6], digest[7]]);
        ProcessSeed {
            unique,
            counter: AtomicU32::new(start),
        }
    })
}

fn hex_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("static pattern"))
}

impl RecordId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    fn generate_at(now: DateTime<Utc>) -> Self {
        let seed = seed();
        let count = seed.counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;
        let secs = now.timestamp().clamp(0, u32::MAX as i64) as u32;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(&seed.unique);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);

        Self(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }

    /// Parse a 24-character hex identifier; case is normalized to lowercase
    pub fn parse(s: &str) -> Result<Self> {
        if Self::is_valid(s) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(SchemaError::InvalidFormat(format!(
                "'{}' is not a 24-character hex identifier",
                s
            )))
        }
    }

    pub fn is_valid(s: &str) -> bool {
        hex_pattern().is_match(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Creation time encoded in the identifier, to the second
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let secs = u32::from_str_radix(&self.0[..8], 16).ok()?;
        DateTime::from_timestamp(secs as i64, 0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        RecordId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl From<RecordId> for serde_json::Value {
    fn from(id: RecordId) -> Self {
        serde_json::Value::String(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid_and_distinct() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
        assert!(RecordId::is_valid(a.as_str()));
        assert_eq!(a.as_str().len(), 24);
    }

    #[test]
    fn test_ids_sort_by_generation_order_within_a_second() {
        let now = Utc::now();
        let a = RecordId::generate_at(now);
        let b = RecordId::generate_at(now);
        // Counter wrap is the only exception, once every 2^24 ids
        if &b.as_str()[18..] != "000000" {
            assert!(a < b);
        }
    }

    #[test]
    fn test_timestamp_round_trip() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let id = RecordId::generate_at(now);
        assert_eq!(id.timestamp(), Some(now));
    }

    #[test]
    fn test_parse_normalizes_case() {
        let id = RecordId::parse("65A1B2C3D4E5F60718293A4B").unwrap();
        assert_eq!(id.as_str(), "65a1b2c3d4e5f60718293a4b");
        assert!(RecordId::parse("not-an-id").is_err());
        assert!(RecordId::parse("65a1b2c3d4e5f60718293a4").is_err());
    }

    #[test]
    fn test_deserialize_rejects_bad_ids() {
        let ok: RecordId = serde_json::from_str("\"65a1b2c3d4e5f60718293a4b\"").unwrap();
        assert_eq!(ok.as_str(), "65a1b2c3d4e5f60718293a4b");
        assert!(serde_json::from_str::<RecordId>("\"xyz\"").is_err());
    }
}
