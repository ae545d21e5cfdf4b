//! # unilateral-consensus
//!
//! Write-commit engine for an append-only, hash-linked event ledger.
//!
//! ## Architecture
//!
//! Under unilateral consensus a single logical writer decides. Every event
//! that passes the guard is committed into its own block and is final the
//! moment the call returns; there is no voting and no fork.
//!
//! ```text
//! submit ──→ [guard] ──→ EventStore (pending)
//!                              │
//!                              ▼
//!            BlockStore.add(height = latest + 1) ──duplicate──┐
//!                              │                               │
//!                              │ ok                    retry from latest
//!                              ▼
//!            EventStore.update_if (pending → consensus)
//!                              │
//!                              ▼
//!                  BlockNotifier ──BlockAdded──→ [Ledger Bus]
//! ```
//!
//! ### Concurrency
//!
//! Any number of tasks may submit against the same stores. They never take a
//! lock in the engine: each one races an insert-if-absent on the next height
//! and the loser retries on top of the winner's block.
//! A recovery pass may drive the same pending event as a live submission;
//! both converge on one block and only one of them announces it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use unilateral_consensus::{ConsensusDependencies, ConsensusService, ValidatorRegistry};
//!
//! let service = ConsensusService::new(ConsensusDependencies {
//!     events,
//!     blocks,
//!     operations,
//!     notifier,
//!     validators: Arc::new(ValidatorRegistry::with_builtins()),
//!     config: ConsensusConfig::default(),
//! });
//!
//! service
//!     .submit_configuration_change(LedgerConfiguration::new("L1", 0), SubmitOptions::genesis())
//!     .await?;
//! let receipt = service.submit_operation(operation).await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod guard;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-export main types
pub use adapters::{
    InMemoryBlockStore, InMemoryEventStore, InMemoryOperationStore, RecordingNotifier,
    SharedBusNotifier,
};
pub use domain::{
    AppendRetryPolicy, ConsensusConfig, ConsensusError, ConsensusResult, SubmissionReceipt,
    SubmitOptions, SyntaxError, ValidationReport, ValidatorOutcome, ValidatorVerdict,
};
pub use guard::{
    CandidateEvent, EventGuard, EventValidator, OperationTypeGuard, RecordSizeGuard,
    ValidatorRegistry,
};
pub use ports::{
    BlockNotifier, BlockStore, ConsensusApi, EventStore, LedgerReader, OperationStore,
    SystemTimeSource, TimeSource,
};
pub use service::{ConsensusDependencies, ConsensusService};
