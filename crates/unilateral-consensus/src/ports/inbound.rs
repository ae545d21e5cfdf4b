//! Driving ports (Inbound API)

use crate::domain::{ConsensusResult, SubmissionReceipt, SubmitOptions};
use async_trait::async_trait;
use serde_json::Value;
use shared_types::{
    BlockRecord, BlockSummary, ContentHash, EventRecord, LedgerConfiguration, Operation,
};

/// Read access to committed ledger state.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Summary of the highest committed block, `None` before genesis.
    async fn latest_block_summary(&self) -> ConsensusResult<Option<BlockSummary>>;

    async fn block_at(&self, height: u64) -> ConsensusResult<Option<BlockRecord>>;

    async fn event(&self, event_hash: &ContentHash) -> ConsensusResult<Option<EventRecord>>;

    /// The configuration currently governing the ledger.
    async fn latest_configuration(&self) -> ConsensusResult<Option<LedgerConfiguration>>;
}

/// Primary commit engine API
///
/// Every successful submission is final: the event is committed into exactly
/// one block before the call returns.
#[async_trait]
pub trait ConsensusApi: LedgerReader {
    /// Submit a ledger configuration change.
    ///
    /// With `options.genesis` the configuration bootstraps the ledger as
    /// block 0. Otherwise it must target the current ledger and carry the
    /// next configuration sequence.
    ///
    /// The sequence check runs before the pipeline against the configuration
    /// in effect at that moment. Two changes submitted concurrently with the
    /// same next sequence can therefore both commit; each lands in its own
    /// block and the one at the greater height governs afterwards.
    ///
    /// Concurrent genesis calls for an empty ledger are arbitrated by the
    /// block 0 insert: one commits, the others get `GenesisExists` and leave
    /// no effective or pending configuration behind.
    async fn submit_configuration_change(
        &self,
        configuration: LedgerConfiguration,
        options: SubmitOptions,
    ) -> ConsensusResult<SubmissionReceipt>;

    /// Submit a single operation wrapped in a new operation event.
    async fn submit_operation(&self, operation: Operation) -> ConsensusResult<SubmissionReceipt>;

    /// Content address of any JSON record.
    fn hash(&self, record: &Value) -> ConsensusResult<ContentHash>;

    /// Finish every event left pending by an interrupted submission.
    async fn recover_pending(&self) -> ConsensusResult<Vec<SubmissionReceipt>>;
}
