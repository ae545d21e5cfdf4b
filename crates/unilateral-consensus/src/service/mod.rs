//! Commit Service - Core business logic
//!
//! # Pipeline
//!
//! Every submission runs the same ordered stages:
//!
//! ```text
//! hash ──→ guard ──→ persist ──→ extend ──→ finalize ──→ notify
//! ```
//!
//! - `hash`: content address of the event (and of its operations)
//! - `guard`: validators of the governing configuration
//! - `persist`: operations, then the event with `pending: true`
//! - `extend`: optimistic append loop, see `extender`
//! - `finalize`: flip the event from pending to committed
//! - `notify`: `BlockAdded` (and `ConfigurationChanged`) on the bus
//!
//! The engine holds no lock of its own. Writers that race for the same
//! height are arbitrated by the block store's uniqueness constraint.

mod extender;
mod finalizer;
mod genesis;
mod recovery;


use crate::domain::{
    ConsensusConfig, ConsensusError, ConsensusResult, SubmissionReceipt, SubmitOptions,
    SyntaxError, ValidationReport,
};
use crate::guard::{CandidateEvent, ValidatorRegistry};
use crate::metrics;
use crate::ports::{
    BlockNotifier, BlockStore, ConsensusApi, EventStore, LedgerReader, OperationStore,
    SystemTimeSource, TimeSource,
};
use async_trait::async_trait;
use serde_json::Value;
use shared_crypto::ContentHasher;
use shared_types::{
    BlockRecord, BlockSummary, ContentHash, Event, EventMeta, EventRecord, LedgerConfiguration,
    Operation, OperationMeta, OperationRecord, Timestamp,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Commit Service
pub struct ConsensusService<E, B, O, N>
where
    E: EventStore,
    B: BlockStore,
    O: OperationStore,
    N: BlockNotifier,
{
    events: Arc<E>,
    blocks: Arc<B>,
    operations: Arc<O>,
    notifier: Arc<N>,
    validators: Arc<ValidatorRegistry>,
    hasher: ContentHasher,
    config: ConsensusConfig,
    time_source: Box<dyn TimeSource>,
}

/// Dependencies for ConsensusService
pub struct ConsensusDependencies<E, B, O, N> {
    pub events: Arc<E>,
    pub blocks: Arc<B>,
    pub operations: Arc<O>,
    pub notifier: Arc<N>,
    pub validators: Arc<ValidatorRegistry>,
    pub config: ConsensusConfig,
}

impl<E, B, O, N> ConsensusService<E, B, O, N>
where
    E: EventStore,
    B: BlockStore,
    O: OperationStore,
    N: BlockNotifier,
{
    /// Create a new ConsensusService
    pub fn new(deps: ConsensusDependencies<E, B, O, N>) -> Self {
        Self {
            events: deps.events,
            blocks: deps.blocks,
            operations: deps.operations,
            notifier: deps.notifier,
            validators: deps.validators,
            hasher: ContentHasher::new(),
            config: deps.config,
            time_source: Box::new(SystemTimeSource),
        }
    }

    /// Set custom time source (for testing)
    pub fn with_time_source(mut self, time_source: Box<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    /// Configuration currently governing the ledger.
    async fn effective_configuration(&self) -> ConsensusResult<LedgerConfiguration> {
        self.events
            .get_latest_config()
            .await?
            .and_then(|record| record.event.configuration_payload().cloned())
            .ok_or(ConsensusError::MissingConfiguration)
    }

    /// Guard stage. Rejections are counted and announced before returning.
    async fn guard(
        &self,
        configuration: &LedgerConfiguration,
        candidate: &CandidateEvent,
        event_hash: &ContentHash,
    ) -> ConsensusResult<ValidationReport> {
        let guard = self.validators.resolve(configuration)?;

        match guard.check(candidate).await {
            Ok(report) => {
                debug!(stage = "guard", event_hash = %event_hash, "Event accepted");
                Ok(report)
            }
            Err(ConsensusError::Validation(report)) => {
                let reason = report.rejection_reason().unwrap_or("validator_rejected");
                metrics::record_event_rejected(reason);
                warn!(
                    stage = "guard",
                    event_hash = %event_hash,
                    reason,
                    summary = %report.summary(),
                    "Event rejected"
                );
                if let Err(e) = self
                    .notifier
                    .event_rejected(
                        &configuration.ledger,
                        event_hash,
                        report.event_type,
                        &report.summary(),
                    )
                    .await
                {
                    warn!(event_hash = %event_hash, error = %e, "Failed to announce rejection");
                }
                Err(ConsensusError::Validation(report))
            }
            Err(e) => Err(e),
        }
    }

    /// Stages persist → extend → finalize → notify for an accepted event.
    async fn commit(
        &self,
        event: Event,
        event_hash: ContentHash,
        operations: Vec<OperationRecord>,
    ) -> ConsensusResult<SubmissionReceipt> {
        let started = Instant::now();

        if !operations.is_empty() {
            self.operations.add_many(operations).await?;
        }
        self.events
            .add(event.clone(), EventMeta::pending(event_hash.clone(), self.now()))
            .await?;
        debug!(stage = "persist", event_hash = %event_hash, "Event persisted as pending");

        let block = self.extend_chain(&event_hash).await?;
        let finalized = self.finalize_event(&event, &event_hash).await?;

        metrics::record_append_latency(started.elapsed().as_secs_f64());
        info!(
            event_hash = %event_hash,
            block_height = block.block.height(),
            block_hash = %block.meta.block_hash,
            "Event committed"
        );

        // A concurrent recovery that committed the event also announced it.
        if finalized.is_some() {
            self.announce(&event, &block).await?;
        }
        Ok(receipt(event_hash, &block))
    }
}

fn receipt(event_hash: ContentHash, block: &BlockRecord) -> SubmissionReceipt {
    SubmissionReceipt {
        event_hash,
        block_height: block.block.height(),
        block_hash: block.meta.block_hash.clone(),
    }
}

#[async_trait]
impl<E, B, O, N> LedgerReader for ConsensusService<E, B, O, N>
where
    E: EventStore,
    B: BlockStore,
    O: OperationStore,
    N: BlockNotifier,
{
    async fn latest_block_summary(&self) -> ConsensusResult<Option<BlockSummary>> {
        Ok(self.blocks.get_latest_summary().await?)
    }

    async fn block_at(&self, height: u64) -> ConsensusResult<Option<BlockRecord>> {
        Ok(self.blocks.get_by_height(height).await?)
    }

    async fn event(&self, event_hash: &ContentHash) -> ConsensusResult<Option<EventRecord>> {
        Ok(self.events.get(event_hash).await?)
    }

    async fn latest_configuration(&self) -> ConsensusResult<Option<LedgerConfiguration>> {
        match self.effective_configuration().await {
            Ok(configuration) => Ok(Some(configuration)),
            Err(ConsensusError::MissingConfiguration) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<E, B, O, N> ConsensusApi for ConsensusService<E, B, O, N>
where
    E: EventStore,
    B: BlockStore,
    O: OperationStore,
    N: BlockNotifier,
{
    #[instrument(
        skip_all,
        fields(ledger = %configuration.ledger, sequence = configuration.sequence, genesis = options.genesis)
    )]
    async fn submit_configuration_change(
        &self,
        configuration: LedgerConfiguration,
        options: SubmitOptions,
    ) -> ConsensusResult<SubmissionReceipt> {
        if options.genesis {
            return self.initialize_genesis(configuration).await;
        }

        let current = self.effective_configuration().await?;
        if configuration.ledger != current.ledger {
            return Err(SyntaxError::LedgerMismatch {
                current: current.ledger,
                submitted: configuration.ledger,
            }
            .into());
        }
        let expected = current.sequence + 1;
        if configuration.sequence != expected {
            return Err(SyntaxError::NonSequentialConfiguration {
                expected,
                actual: configuration.sequence,
            }
            .into());
        }

        let event = Event::configuration(configuration);
        let event_hash = self.hasher.hash(&event)?;
        debug!(stage = "hash", event_hash = %event_hash, "Configuration event hashed");

        let candidate = CandidateEvent::configuration(event.clone());
        self.guard(&current, &candidate, &event_hash).await?;

        self.commit(event, event_hash, Vec::new()).await
    }

    #[instrument(skip_all, fields(operation_type = %operation.operation_type))]
    async fn submit_operation(&self, operation: Operation) -> ConsensusResult<SubmissionReceipt> {
        let configuration = self.effective_configuration().await?;

        let operation_hash = self.hasher.hash(&operation)?;
        let event = Event::operation(vec![operation_hash.clone()]);
        let event_hash = self.hasher.hash(&event)?;
        debug!(
            stage = "hash",
            event_hash = %event_hash,
            operation_hash = %operation_hash,
            "Operation event hashed"
        );

        let candidate = CandidateEvent::operation(event.clone(), vec![operation.clone()]);
        self.guard(&configuration, &candidate, &event_hash).await?;

        let record = OperationRecord {
            operation,
            meta: OperationMeta {
                operation_hash,
                event_hash: event_hash.clone(),
                event_order: 0,
            },
        };
        self.commit(event, event_hash, vec![record]).await
    }

    fn hash(&self, record: &Value) -> ConsensusResult<ContentHash> {
        Ok(self.hasher.hash_value(record)?)
    }

    async fn recover_pending(&self) -> ConsensusResult<Vec<SubmissionReceipt>> {
        self.recover().await
    }
}
