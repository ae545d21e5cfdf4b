//! # Concurrency Tests
//!
//! Several writers submitting to one ledger at once. The engine holds no
//! lock: writers race an insert-if-absent on the next height and losers
//! retry on top of the winner's block.
//!
//! ## Properties Checked
//!
//! - Heights stay contiguous with no gaps and no duplicates
//! - Every block links to the hash of the block below it
//! - Every accepted event lands in exactly one block, even when recovery
//!   runs alongside the submission that owns it
//! - No event is both pending and committed
//! - Racing genesis calls leave exactly one governing configuration

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::future::join_all;
    use serde_json::json;
    use tokio::sync::Barrier;

    use shared_types::{
        Block, BlockMeta, BlockRecord, BlockSummary, ContentHash, Event, EventMeta, EventRecord,
        LedgerConfiguration, MetaCondition, MetaPatch, Operation, StoreError, ValidatorDescriptor,
    };
    use unilateral_consensus::{
        AppendRetryPolicy, BlockStore, ConsensusApi, ConsensusConfig, ConsensusDependencies,
        ConsensusError, ConsensusService, EventStore, InMemoryBlockStore, InMemoryEventStore,
        InMemoryOperationStore, LedgerReader, OperationTypeGuard, RecordingNotifier,
        SubmitOptions, ValidatorRegistry,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Once armed, holds the next `gated` block reads at a barrier, so the
    /// gated writers all decide on the same view of the chain.
    struct GatedBlockStore {
        inner: InMemoryBlockStore,
        barrier: Barrier,
        gated: usize,
        reads: AtomicUsize,
    }

    impl GatedBlockStore {
        fn new(gated: usize) -> Self {
            Self {
                inner: InMemoryBlockStore::new(),
                barrier: Barrier::new(gated),
                gated,
                reads: AtomicUsize::new(gated),
            }
        }

        fn arm(&self) {
            self.reads.store(0, Ordering::SeqCst);
        }

        async fn gate(&self) {
            if self.reads.fetch_add(1, Ordering::SeqCst) < self.gated {
                self.barrier.wait().await;
            }
        }
    }

    #[async_trait]
    impl BlockStore for GatedBlockStore {
        async fn add(&self, block: Block, meta: BlockMeta) -> Result<BlockRecord, StoreError> {
            self.inner.add(block, meta).await
        }

        async fn get_latest_summary(&self) -> Result<Option<BlockSummary>, StoreError> {
            let summary = self.inner.get_latest_summary().await?;
            self.gate().await;
            Ok(summary)
        }

        async fn get_by_height(&self, height: u64) -> Result<Option<BlockRecord>, StoreError> {
            let record = self.inner.get_by_height(height).await?;
            self.gate().await;
            Ok(record)
        }
    }

    /// Yields before every call, so a concurrent task gets to run between
    /// each step of the append loop.
    #[derive(Default)]
    struct YieldingBlockStore {
        inner: InMemoryBlockStore,
    }

    #[async_trait]
    impl BlockStore for YieldingBlockStore {
        async fn add(&self, block: Block, meta: BlockMeta) -> Result<BlockRecord, StoreError> {
            tokio::task::yield_now().await;
            self.inner.add(block, meta).await
        }

        async fn get_latest_summary(&self) -> Result<Option<BlockSummary>, StoreError> {
            tokio::task::yield_now().await;
            self.inner.get_latest_summary().await
        }

        async fn get_by_height(&self, height: u64) -> Result<Option<BlockRecord>, StoreError> {
            tokio::task::yield_now().await;
            self.inner.get_by_height(height).await
        }
    }

    /// Once armed, holds the next `gated` reads of the effective
    /// configuration at a barrier.
    struct GatedEventStore {
        inner: InMemoryEventStore,
        barrier: Barrier,
        gated: usize,
        reads: AtomicUsize,
    }

    impl GatedEventStore {
        fn new(gated: usize) -> Self {
            Self {
                inner: InMemoryEventStore::new(),
                barrier: Barrier::new(gated),
                gated,
                reads: AtomicUsize::new(gated),
            }
        }

        fn arm(&self) {
            self.reads.store(0, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl EventStore for GatedEventStore {
        async fn add(&self, event: Event, meta: EventMeta) -> Result<EventRecord, StoreError> {
            self.inner.add(event, meta).await
        }

        async fn update(
            &self,
            event_hash: &ContentHash,
            patches: Vec<MetaPatch>,
        ) -> Result<EventMeta, StoreError> {
            self.inner.update(event_hash, patches).await
        }

        async fn update_if(
            &self,
            event_hash: &ContentHash,
            condition: MetaCondition,
            patches: Vec<MetaPatch>,
        ) -> Result<Option<EventMeta>, StoreError> {
            self.inner.update_if(event_hash, condition, patches).await
        }

        async fn get(&self, event_hash: &ContentHash) -> Result<Option<EventRecord>, StoreError> {
            self.inner.get(event_hash).await
        }

        async fn get_latest_config(&self) -> Result<Option<EventRecord>, StoreError> {
            let latest = self.inner.get_latest_config().await?;
            if self.reads.fetch_add(1, Ordering::SeqCst) < self.gated {
                self.barrier.wait().await;
            }
            Ok(latest)
        }

        async fn get_pending(&self) -> Result<Vec<EventRecord>, StoreError> {
            self.inner.get_pending().await
        }
    }

    struct Ledger<B: BlockStore> {
        service: Arc<ConsensusService<InMemoryEventStore, B, InMemoryOperationStore, RecordingNotifier>>,
        events: Arc<InMemoryEventStore>,
        blocks: Arc<B>,
        notifier: Arc<RecordingNotifier>,
    }

    fn create_ledger<B: BlockStore>(blocks: Arc<B>, retry: AppendRetryPolicy) -> Ledger<B> {
        let events = Arc::new(InMemoryEventStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let service = ConsensusService::new(ConsensusDependencies {
            events: events.clone(),
            blocks: blocks.clone(),
            operations: Arc::new(InMemoryOperationStore::new()),
            notifier: notifier.clone(),
            validators: Arc::new(ValidatorRegistry::with_builtins()),
            config: ConsensusConfig {
                retry,
                ..ConsensusConfig::default()
            },
        });
        Ledger {
            service: Arc::new(service),
            events,
            blocks,
            notifier,
        }
    }

    fn create_operation(n: usize) -> Operation {
        Operation::new("Create", json!({ "id": format!("urn:test:{n}") }))
    }

    fn allow_only(ledger: &str, sequence: u64, operation_type: &str) -> LedgerConfiguration {
        LedgerConfiguration::new(ledger, sequence).with_validator(
            ValidatorDescriptor::new(OperationTypeGuard::TYPE)
                .with_parameter(OperationTypeGuard::ALLOWED_TYPES, json!([operation_type])),
        )
    }

    fn blocks_containing(records: &[BlockRecord], event_hash: &ContentHash) -> usize {
        records
            .iter()
            .filter(|r| r.block.contains_event(event_hash))
            .count()
    }

    async fn assert_chain_is_linked<B: BlockStore>(ledger: &Ledger<B>, height: u64) {
        let mut previous = ledger.service.block_at(0).await.unwrap().unwrap();
        for h in 1..=height {
            let block = ledger.service.block_at(h).await.unwrap().unwrap();
            assert_eq!(block.block.height(), h);
            assert_eq!(block.block.previous_block.as_ref(), Some(&previous.block.id));
            assert_eq!(
                block.block.previous_block_hash.as_ref(),
                Some(&previous.meta.block_hash)
            );
            previous = block;
        }
        assert!(ledger.service.block_at(height + 1).await.unwrap().is_none());
    }

    // =============================================================================
    // RACING WRITERS
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_writers_on_same_predecessor_get_consecutive_heights() {
        let blocks = Arc::new(GatedBlockStore::new(2));
        let ledger = create_ledger(blocks.clone(), AppendRetryPolicy::default());
        ledger
            .service
            .submit_configuration_change(LedgerConfiguration::new("L1", 0), SubmitOptions::genesis())
            .await
            .unwrap();
        blocks.arm();

        let first = tokio::spawn({
            let service = Arc::clone(&ledger.service);
            async move { service.submit_operation(create_operation(1)).await }
        });
        let second = tokio::spawn({
            let service = Arc::clone(&ledger.service);
            async move { service.submit_operation(create_operation(2)).await }
        });

        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();

        let mut heights = vec![a.block_height, b.block_height];
        heights.sort_unstable();
        assert_eq!(heights, vec![1, 2]);
        assert_ne!(a.event_hash, b.event_hash);
        assert_chain_is_linked(&ledger, 2).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_writers_produce_contiguous_chain() {
        const WRITERS: usize = 32;

        let ledger = create_ledger(
            Arc::new(InMemoryBlockStore::new()),
            AppendRetryPolicy::unbounded(),
        );
        ledger
            .service
            .submit_configuration_change(LedgerConfiguration::new("L1", 0), SubmitOptions::genesis())
            .await
            .unwrap();

        let handles = (0..WRITERS).map(|n| {
            let service = Arc::clone(&ledger.service);
            tokio::spawn(async move { service.submit_operation(create_operation(n)).await })
        });
        let receipts: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let heights: HashSet<u64> = receipts.iter().map(|r| r.block_height).collect();
        assert_eq!(heights, (1..=WRITERS as u64).collect());
        assert_eq!(ledger.blocks.len(), WRITERS + 1);
        assert_chain_is_linked(&ledger, WRITERS as u64).await;

        // One notification per block, genesis included.
        assert_eq!(ledger.notifier.blocks_added().len(), WRITERS + 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_event_is_both_pending_and_committed() {
        const WRITERS: usize = 16;

        let ledger = create_ledger(
            Arc::new(InMemoryBlockStore::new()),
            AppendRetryPolicy::unbounded(),
        );
        ledger
            .service
            .submit_configuration_change(LedgerConfiguration::new("L1", 0), SubmitOptions::genesis())
            .await
            .unwrap();

        let handles = (0..WRITERS).map(|n| {
            let service = Arc::clone(&ledger.service);
            tokio::spawn(async move { service.submit_operation(create_operation(n)).await })
        });
        for joined in join_all(handles).await {
            joined.unwrap().unwrap();
        }

        let records = ledger.events.records();
        assert_eq!(records.len(), WRITERS + 1);
        for record in records {
            assert!(record.meta.is_committed());
            assert!(!record.meta.is_pending());
        }
        assert!(ledger.service.recover_pending().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_same_operation_from_two_writers_commits_once() {
        let ledger = create_ledger(
            Arc::new(InMemoryBlockStore::new()),
            AppendRetryPolicy::default(),
        );
        ledger
            .service
            .submit_configuration_change(LedgerConfiguration::new("L1", 0), SubmitOptions::genesis())
            .await
            .unwrap();

        let handles = (0..2).map(|_| {
            let service = Arc::clone(&ledger.service);
            tokio::spawn(async move { service.submit_operation(create_operation(7)).await })
        });
        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let committed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ConsensusError::Conflict(_)))));
        assert_eq!(ledger.blocks.len(), 2);
    }

    // =============================================================================
    // RECOVERY ALONGSIDE LIVE SUBMISSIONS
    // =============================================================================

    #[tokio::test]
    async fn test_recovery_racing_in_flight_submission_commits_once() {
        // Vary how far the submission gets before recovery starts.
        for head_start in 0..8 {
            let ledger = create_ledger(
                Arc::new(YieldingBlockStore::default()),
                AppendRetryPolicy::default(),
            );
            ledger
                .service
                .submit_configuration_change(
                    LedgerConfiguration::new("L1", 0),
                    SubmitOptions::genesis(),
                )
                .await
                .unwrap();

            let (submitted, recovered) = tokio::join!(
                ledger.service.submit_operation(create_operation(head_start)),
                async {
                    for _ in 0..head_start {
                        tokio::task::yield_now().await;
                    }
                    ledger.service.recover_pending().await
                }
            );
            let submitted = submitted.unwrap();
            let recovered = recovered.unwrap();

            assert!(recovered.len() <= 1, "head start {head_start}");
            for receipt in &recovered {
                assert_eq!(receipt, &submitted, "head start {head_start}");
            }

            let records = ledger.blocks.inner.records();
            assert_eq!(
                blocks_containing(&records, &submitted.event_hash),
                1,
                "head start {head_start}"
            );
            assert_eq!(records.len(), 2, "head start {head_start}");

            let event = ledger
                .service
                .event(&submitted.event_hash)
                .await
                .unwrap()
                .unwrap();
            assert!(event.meta.is_committed());
            assert!(!event.meta.is_pending());
            assert_eq!(event.meta.block_height, Some(submitted.block_height));

            // Exactly one announcement for the block, besides genesis.
            assert_eq!(ledger.notifier.blocks_added().len(), 2, "head start {head_start}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_recovery_loop_during_concurrent_writers() {
        const WRITERS: usize = 16;

        let ledger = create_ledger(
            Arc::new(YieldingBlockStore::default()),
            AppendRetryPolicy::unbounded(),
        );
        ledger
            .service
            .submit_configuration_change(LedgerConfiguration::new("L1", 0), SubmitOptions::genesis())
            .await
            .unwrap();

        let recovery = tokio::spawn({
            let service = Arc::clone(&ledger.service);
            async move {
                let mut recovered = Vec::new();
                for _ in 0..WRITERS {
                    recovered.extend(service.recover_pending().await.unwrap());
                    tokio::task::yield_now().await;
                }
                recovered
            }
        });
        let handles = (0..WRITERS).map(|n| {
            let service = Arc::clone(&ledger.service);
            tokio::spawn(async move { service.submit_operation(create_operation(n)).await })
        });
        let receipts: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();
        let recovered = recovery.await.unwrap();

        let records = ledger.blocks.inner.records();
        assert_eq!(records.len(), WRITERS + 1);
        for receipt in &receipts {
            assert_eq!(blocks_containing(&records, &receipt.event_hash), 1);
        }
        for receipt in &recovered {
            assert!(receipts.contains(receipt));
        }
        assert_chain_is_linked(&ledger, WRITERS as u64).await;
        assert_eq!(ledger.notifier.blocks_added().len(), WRITERS + 1);
        assert!(ledger.events.get_pending().await.unwrap().is_empty());
    }

    // =============================================================================
    // RACING CONFIGURATIONS
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_racing_genesis_leaves_one_configuration() {
        let blocks = Arc::new(GatedBlockStore::new(2));
        blocks.arm();
        let ledger = create_ledger(blocks.clone(), AppendRetryPolicy::default());

        let candidates = [allow_only("L1", 0, "Create"), allow_only("L1", 0, "Update")];
        let handles = candidates.iter().cloned().map(|configuration| {
            let service = Arc::clone(&ledger.service);
            tokio::spawn(async move {
                service
                    .submit_configuration_change(configuration, SubmitOptions::genesis())
                    .await
            })
        });
        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let winner = results
            .iter()
            .position(|r| r.is_ok())
            .expect("one genesis commits");
        let loser = 1 - winner;
        assert!(matches!(
            results[loser],
            Err(ConsensusError::GenesisExists(ref l)) if l == "L1"
        ));
        assert_eq!(blocks.inner.len(), 1);
        assert_eq!(
            ledger.service.latest_configuration().await.unwrap(),
            Some(candidates[winner].clone())
        );

        let losing_hash = ledger
            .service
            .hash(&serde_json::to_value(Event::configuration(candidates[loser].clone())).unwrap())
            .unwrap();
        assert!(ledger.service.event(&losing_hash).await.unwrap().is_none());

        assert!(ledger.service.recover_pending().await.unwrap().is_empty());
        assert_eq!(ledger.notifier.blocks_added().len(), 1);

        // Only the winner's validators govern later operations.
        let allowed = if winner == 0 { "Create" } else { "Update" };
        let denied = if winner == 0 { "Update" } else { "Create" };
        ledger
            .service
            .submit_operation(Operation::new(allowed, json!({ "id": "urn:test:ok" })))
            .await
            .unwrap();
        let err = ledger
            .service
            .submit_operation(Operation::new(denied, json!({ "id": "urn:test:no" })))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::Validation(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_racing_changes_at_same_sequence_later_block_governs() {
        let events = Arc::new(GatedEventStore::new(2));
        let service = Arc::new(
            ConsensusService::new(ConsensusDependencies {
                events: events.clone(),
                blocks: Arc::new(InMemoryBlockStore::new()),
                operations: Arc::new(InMemoryOperationStore::new()),
                notifier: Arc::new(RecordingNotifier::new()),
                validators: Arc::new(ValidatorRegistry::with_builtins()),
                config: ConsensusConfig::default(),
            }),
        );
        service
            .submit_configuration_change(LedgerConfiguration::new("L1", 0), SubmitOptions::genesis())
            .await
            .unwrap();
        events.arm();

        let changes = [allow_only("L1", 1, "Create"), allow_only("L1", 1, "Update")];
        let handles = changes.iter().cloned().map(|configuration| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .submit_configuration_change(configuration, SubmitOptions::default())
                    .await
            })
        });
        let receipts: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let mut heights: Vec<u64> = receipts.iter().map(|r| r.block_height).collect();
        heights.sort_unstable();
        assert_eq!(heights, vec![1, 2]);

        let later = if receipts[0].block_height == 2 { 0 } else { 1 };
        assert_eq!(
            service.latest_configuration().await.unwrap(),
            Some(changes[later].clone())
        );
    }
}
