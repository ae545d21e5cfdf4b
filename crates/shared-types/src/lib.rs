//! # Shared Types Crate
//!
//! This crate contains the ledger data model used by the commit engine, the
//! record stores and the notification bus.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Every persisted record shape is defined here.
//! - **Content Addressing**: Events, operations and blocks are identified by
//!   the [`ContentHash`] of their canonical form; the hash is never stored
//!   inside the record it addresses, only in its meta.
//! - **Structured Identity**: Block identifiers are `(ledger, height)` pairs
//!   and only become strings at the serialization boundary.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
