//! Genesis initializer
//!
//! Writes block 0 for a ledger's first configuration. The block insert is
//! the arbiter: the event is stored, already committed, only by the caller
//! whose block 0 insert wins, so a losing caller leaves nothing behind.
//! There is no pending window and no retry loop.
//!
//! Re-running genesis with the same configuration completes a ledger whose
//! block 0 was written but whose event never was.

use super::{receipt, ConsensusService};
use crate::domain::{ConsensusError, ConsensusResult, SubmissionReceipt, SyntaxError};
use crate::guard::CandidateEvent;
use crate::metrics;
use crate::ports::{BlockNotifier, BlockStore, EventStore, OperationStore};
use shared_types::{
    Block, BlockMeta, BlockRecord, ContentHash, Event, EventMeta, LedgerConfiguration,
};
use tracing::{info, warn};

impl<E, B, O, N> ConsensusService<E, B, O, N>
where
    E: EventStore,
    B: BlockStore,
    O: OperationStore,
    N: BlockNotifier,
{
    pub(super) async fn initialize_genesis(
        &self,
        configuration: LedgerConfiguration,
    ) -> ConsensusResult<SubmissionReceipt> {
        if configuration.sequence != 0 {
            return Err(SyntaxError::InvalidGenesisSequence(configuration.sequence).into());
        }
        let ledger = configuration.ledger.clone();

        let event = Event::configuration(configuration.clone());
        let event_hash = self.hasher.hash(&event)?;

        if let Some(existing) = self.blocks.get_by_height(0).await? {
            return self
                .complete_genesis(&ledger, &event, &event_hash, &existing)
                .await;
        }

        // Genesis answers to its own validators.
        let candidate = CandidateEvent::configuration(event.clone());
        self.guard(&configuration, &candidate, &event_hash).await?;

        let now = self.now();
        let block = Block::genesis(ledger.clone(), event_hash.clone());
        let block_meta = BlockMeta {
            block_hash: self.hasher.hash(&block)?,
            consensus: true,
            consensus_date: now,
        };
        let record = self
            .blocks
            .add(block, block_meta)
            .await
            .map_err(|e| {
                if e.is_duplicate() {
                    ConsensusError::GenesisExists(ledger.clone())
                } else {
                    ConsensusError::Storage(e)
                }
            })?;

        metrics::record_block_appended();
        let stored = self.store_genesis_event(&event, &event_hash).await?;
        info!(
            ledger = %ledger,
            event_hash = %event_hash,
            block_hash = %record.meta.block_hash,
            "Genesis block written"
        );

        if stored {
            self.announce(&event, &record).await?;
        }
        Ok(receipt(event_hash, &record))
    }

    /// Block 0 already exists. Finish it if it carries this very event and
    /// the event was never stored; otherwise the ledger is taken.
    async fn complete_genesis(
        &self,
        ledger: &str,
        event: &Event,
        event_hash: &ContentHash,
        existing: &BlockRecord,
    ) -> ConsensusResult<SubmissionReceipt> {
        let taken = || ConsensusError::GenesisExists(ledger.to_string());

        if !existing.block.contains_event(event_hash)
            || self.events.get(event_hash).await?.is_some()
        {
            return Err(taken());
        }
        if !self.store_genesis_event(event, event_hash).await? {
            return Err(taken());
        }

        warn!(ledger = %ledger, event_hash = %event_hash, "Completed interrupted genesis");
        self.announce(event, existing).await?;
        Ok(receipt(event_hash.clone(), existing))
    }

    /// Store the genesis event as committed and effective. `false` if another
    /// caller stored it first.
    async fn store_genesis_event(
        &self,
        event: &Event,
        event_hash: &ContentHash,
    ) -> ConsensusResult<bool> {
        let now = self.now();
        let meta = EventMeta {
            event_hash: event_hash.clone(),
            pending: None,
            consensus: Some(true),
            consensus_date: Some(now),
            block_height: Some(0),
            block_order: Some(0),
            effective_configuration: Some(true),
            created: Some(now),
            updated: Some(now),
        };
        match self.events.add(event.clone(), meta).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_duplicate() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
