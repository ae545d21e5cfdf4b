//! # Node Runtime Library
//!
//! This library exposes the internal modules of the node runtime for testing.
//! The main entry point is the `main.rs` binary.
//!
//! ## Modules
//!
//! - `container/` - Node configuration and wiring of the commit engine
//! - `registry/` - Consensus method → engine lookup

#![warn(missing_docs)]
#![allow(missing_docs)] // TODO: Document the public items of container::config
#![allow(clippy::type_complexity)]

pub mod container;
pub mod registry;

// Re-export for easy access
pub use container::{ConfigError, LedgerNode, NodeConfig, NodeConsensus};
pub use container::node::StartupSummary;
pub use registry::{ConsensusRegistry, RegistryError};
