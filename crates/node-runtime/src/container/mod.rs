//! # Node Container
//!
//! Holds the commit engine, its stores and the ledger bus, wired together
//! with the adapters implementing each outbound port.
//!
//! ```text
//! InMemoryEventStore ─────┐
//! InMemoryBlockStore ─────┼──→ ConsensusService ──→ SharedBusNotifier ──→ InMemoryEventBus
//! InMemoryOperationStore ─┘
//! ```

pub mod config;
pub mod node;

pub use config::{AppendConfig, BusConfig, ConfigError, LedgerConfig, NodeConfig};
pub use node::{LedgerNode, NodeConsensus};
