//! # Error Types
//!
//! Defines error types returned by every record store.

use thiserror::Error;

/// Errors that can occur in a record store (events, operations, blocks).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A record with the same unique key already exists.
    ///
    /// For blocks the key is `(ledger, height)`; for events and operations
    /// it is their content hash.
    #[error("Duplicate {collection} record: {key}")]
    Duplicate {
        collection: &'static str,
        key: String,
    },

    /// The requested record does not exist.
    #[error("{collection} record not found: {key}")]
    NotFound {
        collection: &'static str,
        key: String,
    },

    /// Backend I/O or consistency failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Build a duplicate-key error.
    pub fn duplicate(collection: &'static str, key: impl ToString) -> Self {
        Self::Duplicate {
            collection,
            key: key.to_string(),
        }
    }

    /// Build a not-found error.
    pub fn not_found(collection: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            collection,
            key: key.to_string(),
        }
    }

    /// Whether this error is a uniqueness violation.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}
