//! # Ledger Node
//!
//! Owns one ledger: the in-memory stores, the commit engine registered under
//! its consensus method, and the bus that carries its notifications.
//!
//! ## Startup Sequence
//!
//! 1. Submit the genesis configuration if no configuration governs the ledger
//! 2. Recover events left pending by an interrupted submission
//! 3. Serve submissions through the registered `ConsensusApi`

use std::sync::Arc;

use shared_bus::{EventFilter, EventPublisher, InMemoryEventBus, Subscription};
use shared_types::Operation;
use tracing::{info, instrument};
use unilateral_consensus::{
    ConsensusApi, ConsensusDependencies, ConsensusService, InMemoryBlockStore,
    InMemoryEventStore, InMemoryOperationStore, LedgerReader, SharedBusNotifier,
    SubmissionReceipt, SubmitOptions, ValidatorRegistry,
};

use crate::container::config::NodeConfig;
use crate::registry::{ConsensusRegistry, RegistryError};

/// Concrete commit engine over the in-memory stores.
pub type NodeConsensus = ConsensusService<
    InMemoryEventStore,
    InMemoryBlockStore,
    InMemoryOperationStore,
    SharedBusNotifier,
>;

/// What `start` did before the node began serving.
#[derive(Debug, Clone, Default)]
pub struct StartupSummary {
    /// Receipt of the genesis block, when this start created it.
    pub genesis: Option<SubmissionReceipt>,
    /// Events that were pending and are now committed.
    pub recovered: Vec<SubmissionReceipt>,
}

/// A single-ledger node.
pub struct LedgerNode {
    config: NodeConfig,
    bus: Arc<InMemoryEventBus>,
    blocks: Arc<InMemoryBlockStore>,
    registry: ConsensusRegistry,
}

impl LedgerNode {
    /// Wire a node with the built-in validators.
    pub fn new(config: NodeConfig) -> Result<Self, RegistryError> {
        Self::with_validators(config, ValidatorRegistry::with_builtins())
    }

    /// Wire a node with a custom validator registry.
    pub fn with_validators(
        config: NodeConfig,
        validators: ValidatorRegistry,
    ) -> Result<Self, RegistryError> {
        let bus = Arc::new(InMemoryEventBus::with_capacity(config.bus.capacity));
        let blocks = Arc::new(InMemoryBlockStore::new());

        let publisher: Arc<dyn EventPublisher> = bus.clone();
        let consensus: Arc<NodeConsensus> = Arc::new(ConsensusService::new(ConsensusDependencies {
            events: Arc::new(InMemoryEventStore::new()),
            blocks: Arc::clone(&blocks),
            operations: Arc::new(InMemoryOperationStore::new()),
            notifier: Arc::new(SharedBusNotifier::new(publisher)),
            validators: Arc::new(validators),
            config: config.append.consensus_config(),
        }));

        let registry = ConsensusRegistry::new();
        let method = consensus.config().method.clone();
        registry.register(method, consensus)?;

        Ok(Self {
            config,
            bus,
            blocks,
            registry,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.bus)
    }

    pub fn registry(&self) -> &ConsensusRegistry {
        &self.registry
    }

    /// Number of blocks in the chain, genesis included.
    pub fn chain_length(&self) -> usize {
        self.blocks.len()
    }

    /// Subscribe to ledger notifications of this node's ledger.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.bus
            .subscribe(filter.for_ledger(self.config.ledger.ledger_id.clone()))
    }

    /// Engine serving the consensus method named in the genesis configuration.
    pub fn consensus(&self) -> Result<Arc<dyn ConsensusApi>, RegistryError> {
        let method = self.config.ledger.genesis_configuration().consensus_method;
        self.registry.get(&method)
    }

    /// Bootstrap the chain and finish interrupted submissions.
    #[instrument(skip_all, fields(ledger_id = %self.config.ledger.ledger_id))]
    pub async fn start(&self) -> anyhow::Result<StartupSummary> {
        let consensus = self.consensus()?;
        let mut summary = StartupSummary::default();

        // A block 0 without its configuration is an interrupted genesis,
        // which the same genesis call completes.
        match consensus.latest_configuration().await? {
            Some(configuration) => {
                info!(sequence = configuration.sequence, "Chain found, skipping genesis");
            }
            None => {
                info!("No ledger configuration found, running genesis...");
                let receipt = consensus
                    .submit_configuration_change(
                        self.config.ledger.genesis_configuration(),
                        SubmitOptions::genesis(),
                    )
                    .await?;
                info!(block_hash = %receipt.block_hash, "Genesis block created");
                summary.genesis = Some(receipt);
            }
        }

        summary.recovered = consensus.recover_pending().await?;
        if !summary.recovered.is_empty() {
            info!(recovered = summary.recovered.len(), "Recovered pending events");
        }

        Ok(summary)
    }

    /// Submit one operation through the registered engine.
    pub async fn submit(&self, operation: Operation) -> anyhow::Result<SubmissionReceipt> {
        let consensus = self.consensus()?;
        Ok(consensus.submit_operation(operation).await?)
    }
}
