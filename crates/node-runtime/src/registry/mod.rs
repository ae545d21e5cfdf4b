//! # Consensus Registry
//!
//! Maps a ledger configuration's `consensusMethod` to the engine that
//! implements it. Engines are registered explicitly when the node is wired;
//! nothing registers itself on import.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │               ConsensusRegistry               │
//! │                                               │
//! │  "UnilateralConsensus2017" ──→ ConsensusApi   │
//! │  "<other method>"          ──→ ConsensusApi   │
//! └───────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::info;
use unilateral_consensus::ConsensusApi;

/// Registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no consensus engine registered for method {0:?}")]
    UnknownMethod(String),

    #[error("consensus method {0:?} is already registered")]
    AlreadyRegistered(String),
}

/// Consensus method name → engine.
#[derive(Default)]
pub struct ConsensusRegistry {
    engines: RwLock<HashMap<String, Arc<dyn ConsensusApi>>>,
}

impl ConsensusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine. A method can only be registered once.
    pub fn register(
        &self,
        method: impl Into<String>,
        engine: Arc<dyn ConsensusApi>,
    ) -> Result<(), RegistryError> {
        let method = method.into();
        let mut engines = self.engines.write();
        if engines.contains_key(&method) {
            return Err(RegistryError::AlreadyRegistered(method));
        }
        info!("[Registry] Registering consensus method: {}", method);
        engines.insert(method, engine);
        Ok(())
    }

    /// Engine for `method`.
    pub fn get(&self, method: &str) -> Result<Arc<dyn ConsensusApi>, RegistryError> {
        self.engines
            .read()
            .get(method)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownMethod(method.to_string()))
    }

    pub fn contains(&self, method: &str) -> bool {
        self.engines.read().contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.engines.read().keys().cloned().collect();
        methods.sort_unstable();
        methods
    }
}
