//! Crypto error types.

use thiserror::Error;

/// Canonicalization and hashing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The record could not be converted into a JSON value.
    #[error("Record is not serializable: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
