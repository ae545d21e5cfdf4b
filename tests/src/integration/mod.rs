//! Integration tests across the consensus, storage and bus crates.

pub mod chain_flows;
pub mod concurrency;
