//! # SHA-256 Content Hashing
//!
//! `hash(x) == sha256(canonicalize(x))`, rendered as `urn:sha256:<hex>`.

use crate::canonical::{canonicalize, canonicalize_value};
use crate::errors::CryptoError;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use shared_types::ContentHash;

/// Prefix of every content address produced by this crate.
pub const CONTENT_HASH_PREFIX: &str = "urn:sha256:";

/// Content address of raw canonical bytes.
pub fn content_hash_bytes(canonical: &[u8]) -> ContentHash {
    let digest = Sha256::digest(canonical);
    ContentHash::new(format!("{CONTENT_HASH_PREFIX}{}", hex::encode(digest)))
}

/// Content address of any serializable record.
pub fn content_hash<T: Serialize + ?Sized>(record: &T) -> Result<ContentHash, CryptoError> {
    let canonical = canonicalize(record)?;
    Ok(content_hash_bytes(canonical.as_bytes()))
}

/// Stateless hasher handle shared by the consensus service.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl ContentHasher {
    /// Create a hasher.
    pub fn new() -> Self {
        Self
    }

    /// Hash a typed record.
    pub fn hash<T: Serialize + ?Sized>(&self, record: &T) -> Result<ContentHash, CryptoError> {
        content_hash(record)
    }

    /// Hash an untyped JSON record.
    pub fn hash_value(&self, value: &Value) -> Result<ContentHash, CryptoError> {
        let canonical = canonicalize_value(value)?;
        Ok(content_hash_bytes(canonical.as_bytes()))
    }

    /// Canonical size in bytes, used by size guards.
    pub fn canonical_len<T: Serialize + ?Sized>(&self, record: &T) -> Result<usize, CryptoError> {
        Ok(canonicalize(record)?.len())
    }
}
