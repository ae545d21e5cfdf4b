//! # Chain Flow Tests
//!
//! End-to-end submissions through the commit engine with the in-memory stores
//! and the shared ledger bus:
//!
//! 1. **Genesis**: configuration sequence 0 becomes block 0
//! 2. **Operations**: each operation event gets its own hash-linked block
//! 3. **Configuration changes**: sequence checks and validator hand-over
//! 4. **Recovery**: an event stranded by a failed block write is committed
//!    exactly once
//! 5. **Notifications**: `BlockAdded` is observable only after commit

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::timeout;

    use node_runtime::{LedgerNode, NodeConfig};
    use shared_bus::{EventFilter, EventPublisher, EventTopic, InMemoryEventBus, LedgerEvent};
    use shared_types::{
        Block, BlockMeta, BlockRecord, BlockSummary, LedgerConfiguration, Operation, StoreError,
        ValidatorDescriptor,
    };
    use unilateral_consensus::{
        BlockStore, ConsensusApi, ConsensusConfig, ConsensusDependencies, ConsensusError,
        ConsensusService, InMemoryBlockStore, InMemoryEventStore, InMemoryOperationStore,
        LedgerReader, OperationTypeGuard, SharedBusNotifier, SubmitOptions, SyntaxError,
        ValidatorRegistry,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Fails the next `failures` non-genesis inserts with a backend error.
    #[derive(Default)]
    struct FlakyBlockStore {
        inner: InMemoryBlockStore,
        failures: AtomicU32,
    }

    #[async_trait]
    impl BlockStore for FlakyBlockStore {
        async fn add(&self, block: Block, meta: BlockMeta) -> Result<BlockRecord, StoreError> {
            if !block.is_genesis()
                && self
                    .failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(StoreError::Backend("disk unavailable".into()));
            }
            self.inner.add(block, meta).await
        }

        async fn get_latest_summary(&self) -> Result<Option<BlockSummary>, StoreError> {
            self.inner.get_latest_summary().await
        }

        async fn get_by_height(&self, height: u64) -> Result<Option<BlockRecord>, StoreError> {
            self.inner.get_by_height(height).await
        }
    }

    type BusService<B> =
        ConsensusService<InMemoryEventStore, B, InMemoryOperationStore, SharedBusNotifier>;

    fn create_service<B: BlockStore>(blocks: Arc<B>) -> (Arc<BusService<B>>, Arc<InMemoryEventBus>) {
        let bus = Arc::new(InMemoryEventBus::new());
        let publisher: Arc<dyn EventPublisher> = bus.clone();
        let service = ConsensusService::new(ConsensusDependencies {
            events: Arc::new(InMemoryEventStore::new()),
            blocks,
            operations: Arc::new(InMemoryOperationStore::new()),
            notifier: Arc::new(SharedBusNotifier::new(publisher)),
            validators: Arc::new(ValidatorRegistry::with_builtins()),
            config: ConsensusConfig::default(),
        });
        (Arc::new(service), bus)
    }

    fn create_operation(n: u64) -> Operation {
        Operation::new(
            "Create",
            json!({ "@context": "https://w3id.org/test/v1", "id": format!("urn:test:{n}") }),
        )
    }

    async fn bootstrap<S: ConsensusApi>(service: &S, configuration: LedgerConfiguration) {
        service
            .submit_configuration_change(configuration, SubmitOptions::genesis())
            .await
            .unwrap();
    }

    // =============================================================================
    // GENESIS → OPERATIONS
    // =============================================================================

    #[tokio::test]
    async fn test_genesis_then_operations_form_linked_chain() {
        let (service, _bus) = create_service(Arc::new(InMemoryBlockStore::new()));

        let genesis = service
            .submit_configuration_change(
                LedgerConfiguration::new("did:v1:ledger:L1", 0),
                SubmitOptions::genesis(),
            )
            .await
            .unwrap();
        assert_eq!(genesis.block_height, 0);

        let mut previous = genesis;
        for n in 1..=3 {
            let receipt = service.submit_operation(create_operation(n)).await.unwrap();
            assert_eq!(receipt.block_height, n);

            let block = service.block_at(n).await.unwrap().unwrap();
            assert_eq!(block.block.id.to_string(), format!("did:v1:ledger:L1/blocks/{n}"));
            assert_eq!(block.block.previous_block_hash, Some(previous.block_hash.clone()));
            assert_eq!(block.block.event, vec![receipt.event_hash.clone()]);

            let event = service.event(&receipt.event_hash).await.unwrap().unwrap();
            assert!(event.meta.is_committed());
            assert!(!event.meta.is_pending());
            assert_eq!(event.meta.block_height, Some(n));
            assert_eq!(event.meta.block_order, Some(0));

            previous = receipt;
        }

        let latest = service.latest_block_summary().await.unwrap().unwrap();
        assert_eq!(latest.block_height, 3);
        assert_eq!(latest.block_hash, previous.block_hash);
    }

    #[tokio::test]
    async fn test_genesis_configuration_becomes_effective() {
        let (service, _bus) = create_service(Arc::new(InMemoryBlockStore::new()));
        bootstrap(&*service, LedgerConfiguration::new("L1", 0)).await;

        let effective = service.latest_configuration().await.unwrap().unwrap();
        assert_eq!(effective.ledger, "L1");
        assert_eq!(effective.sequence, 0);
    }

    // =============================================================================
    // CONFIGURATION CHANGES
    // =============================================================================

    #[tokio::test]
    async fn test_configuration_sequence_must_be_next() {
        let (service, _bus) = create_service(Arc::new(InMemoryBlockStore::new()));
        let genesis = LedgerConfiguration::new("L1", 0);
        bootstrap(&*service, genesis.clone()).await;

        let skipped = LedgerConfiguration::new("L1", 2);
        let err = service
            .submit_configuration_change(skipped, SubmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::Syntax(SyntaxError::NonSequentialConfiguration {
                expected: 1,
                actual: 2
            })
        ));

        let receipt = service
            .submit_configuration_change(genesis.successor(), SubmitOptions::default())
            .await
            .unwrap();
        assert_eq!(receipt.block_height, 1);
        assert_eq!(
            service.latest_configuration().await.unwrap().unwrap().sequence,
            1
        );
    }

    #[tokio::test]
    async fn test_new_configuration_governs_later_operations() {
        let (service, _bus) = create_service(Arc::new(InMemoryBlockStore::new()));
        let genesis = LedgerConfiguration::new("L1", 0);
        bootstrap(&*service, genesis.clone()).await;

        service.submit_operation(create_operation(1)).await.unwrap();

        let restricted = genesis.successor().with_validator(
            ValidatorDescriptor::new(OperationTypeGuard::TYPE)
                .with_parameter(OperationTypeGuard::ALLOWED_TYPES, json!(["Update"])),
        );
        service
            .submit_configuration_change(restricted, SubmitOptions::default())
            .await
            .unwrap();

        let err = service
            .submit_operation(create_operation(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::Validation(_)));
        assert_eq!(service.latest_block_summary().await.unwrap().unwrap().block_height, 2);
    }

    #[tokio::test]
    async fn test_required_validation_with_no_validators_rejects() {
        let (service, _bus) = create_service(Arc::new(InMemoryBlockStore::new()));
        // The size guard claims the genesis event itself.
        let genesis = LedgerConfiguration::new("L1", 0)
            .with_validator(ValidatorDescriptor::new("RecordSizeGuard").with_parameter(
                "maxBytes",
                json!(1_000_000),
            ))
            .require_event_validation(true);
        bootstrap(&*service, genesis.clone()).await;

        let bare = genesis.successor();
        let bare = LedgerConfiguration {
            event_validator: Vec::new(),
            ..bare
        };
        service
            .submit_configuration_change(bare, SubmitOptions::default())
            .await
            .unwrap();

        let err = service
            .submit_operation(create_operation(1))
            .await
            .unwrap_err();
        let ConsensusError::Validation(report) = err else {
            panic!("expected validation error");
        };
        assert!(report.require_event_validation);
        assert!(report.outcomes.is_empty());
        assert!(!report.has_applicable());
    }

    // =============================================================================
    // RECOVERY
    // =============================================================================

    #[tokio::test]
    async fn test_event_stranded_by_block_failure_recovers_once() {
        let blocks = Arc::new(FlakyBlockStore::default());
        let (service, bus) = create_service(blocks.clone());
        bootstrap(&*service, LedgerConfiguration::new("L1", 0)).await;
        let mut subscription = bus.subscribe(EventFilter::topics(vec![EventTopic::Chain]));

        blocks.failures.store(1, Ordering::SeqCst);
        let err = service
            .submit_operation(create_operation(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::Storage(_)));
        assert!(matches!(subscription.try_recv(), Ok(None)));

        let recovered = service.recover_pending().await.unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].block_height, 1);

        let event = service
            .event(&recovered[0].event_hash)
            .await
            .unwrap()
            .unwrap();
        assert!(event.meta.is_committed());
        assert!(!event.meta.is_pending());

        let added = subscription.recv_block_added().await.unwrap();
        assert_eq!(added.block_height, 1);

        assert!(service.recover_pending().await.unwrap().is_empty());
        let next = service.submit_operation(create_operation(2)).await.unwrap();
        assert_eq!(next.block_height, 2);
    }

    // =============================================================================
    // NOTIFICATIONS
    // =============================================================================

    #[tokio::test]
    async fn test_block_added_observed_after_commit() {
        let (service, bus) = create_service(Arc::new(InMemoryBlockStore::new()));
        let mut subscription = bus.subscribe(EventFilter::topics(vec![EventTopic::Chain]));
        bootstrap(&*service, LedgerConfiguration::new("L1", 0)).await;
        assert_eq!(subscription.recv_block_added().await.unwrap().block_height, 0);

        let receipt = service.submit_operation(create_operation(1)).await.unwrap();
        let added = timeout(Duration::from_secs(1), subscription.recv_block_added())
            .await
            .expect("BlockAdded within 1s")
            .unwrap();

        assert_eq!(added.block_hash, receipt.block_hash);
        // Everything tied to the block is readable as soon as it is announced.
        let block = service.block_at(added.block_height).await.unwrap().unwrap();
        for event_hash in &block.block.event {
            let event = service.event(event_hash).await.unwrap().unwrap();
            assert!(event.meta.is_committed());
        }
    }

    #[tokio::test]
    async fn test_configuration_changed_follows_block_added() {
        let (service, bus) = create_service(Arc::new(InMemoryBlockStore::new()));
        let genesis = LedgerConfiguration::new("L1", 0);
        bootstrap(&*service, genesis.clone()).await;
        let mut subscription = bus.subscribe(EventFilter::all());

        service
            .submit_configuration_change(genesis.successor(), SubmitOptions::default())
            .await
            .unwrap();

        assert!(matches!(
            subscription.recv().await.unwrap(),
            LedgerEvent::BlockAdded(added) if added.block_height == 1
        ));
        assert!(matches!(
            subscription.recv().await.unwrap(),
            LedgerEvent::ConfigurationChanged { sequence: 1, block_height: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_rejection_published_on_bus() {
        let (service, bus) = create_service(Arc::new(InMemoryBlockStore::new()));
        let genesis = LedgerConfiguration::new("L1", 0).with_validator(
            ValidatorDescriptor::new(OperationTypeGuard::TYPE)
                .with_parameter(OperationTypeGuard::ALLOWED_TYPES, json!(["Update"])),
        );
        bootstrap(&*service, genesis).await;
        let mut subscription = bus.subscribe(EventFilter::topics(vec![EventTopic::Validation]));

        service
            .submit_operation(create_operation(1))
            .await
            .unwrap_err();

        match subscription.recv().await.unwrap() {
            LedgerEvent::EventRejected { ledger_id, reason, .. } => {
                assert_eq!(ledger_id, "L1");
                assert!(reason.contains("operation type not allowed: Create"));
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    // =============================================================================
    // NODE RUNTIME
    // =============================================================================

    #[tokio::test]
    async fn test_node_bootstraps_and_serves() {
        let mut config = NodeConfig::default();
        config.ledger.ledger_id = "L-node".to_string();
        config.ledger.allowed_operation_types = vec!["Create".to_string()];
        let node = LedgerNode::new(config).unwrap();

        let startup = node.start().await.unwrap();
        assert!(startup.genesis.is_some());

        let receipt = node.submit(create_operation(1)).await.unwrap();
        assert_eq!(receipt.block_height, 1);

        let refused = node
            .submit(Operation::new("Delete", json!({ "id": "urn:test:1" })))
            .await;
        assert!(refused.is_err());
        assert_eq!(node.chain_length(), 2);
    }
}
