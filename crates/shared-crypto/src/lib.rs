//! # Shared Crypto - Content Addressing Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `canonical` | Sorted-key JSON | Deterministic record serialization |
//! | `hashing` | SHA-256 | Content addresses for events, operations, blocks |
//!
//! ## Properties
//!
//! - **Order independence**: records that differ only in object key order
//!   canonicalize to the same bytes.
//! - **Purity**: hashing reads nothing but its input and has no side effects,
//!   so it is safe to call from any number of tasks concurrently.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod errors;
pub mod hashing;

// Re-exports
pub use canonical::{canonicalize, canonicalize_value};
pub use errors::CryptoError;
pub use hashing::{content_hash, content_hash_bytes, ContentHasher, CONTENT_HASH_PREFIX};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
