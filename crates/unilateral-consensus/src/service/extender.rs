//! Chain extender
//!
//! Appends one block for an already persisted, pending event. Each pass of
//! the loop starts from the height recorded in the event's meta:
//!
//! 1. no height recorded: claim `latest + 1` with a conditional meta update
//! 2. recorded height holds a block with this event: done
//! 3. recorded height is free: build on the block below it
//! 4. recorded height holds another event: move the claim to `latest + 1`,
//!    conditional on the claim not having moved meanwhile
//!
//! then insert-if-absent on `(ledger, height)`. A duplicate-key failure means
//! another writer took the height first; the loop starts over. Any other
//! failure aborts.
//!
//! A claim only moves off a height once that height is taken by another
//! event, and every insert targets the currently claimed height. Two
//! writers driving the same event (a submission and a concurrent recovery)
//! therefore converge on a single block.

use super::ConsensusService;
use crate::domain::{ConsensusError, ConsensusResult};
use crate::metrics;
use crate::ports::{BlockNotifier, BlockStore, EventStore, OperationStore};
use shared_types::{
    Block, BlockMeta, BlockRecord, BlockSummary, ContentHash, MetaChanges, MetaCondition,
    MetaPatch, StoreError,
};
use tracing::{debug, warn};

impl<E, B, O, N> ConsensusService<E, B, O, N>
where
    E: EventStore,
    B: BlockStore,
    O: OperationStore,
    N: BlockNotifier,
{
    pub(super) async fn extend_chain(
        &self,
        event_hash: &ContentHash,
    ) -> ConsensusResult<BlockRecord> {
        let policy = &self.config.retry;
        let mut attempt: u32 = 0;

        loop {
            let claimed = self
                .events
                .get(event_hash)
                .await?
                .ok_or_else(|| StoreError::not_found("event", event_hash))?
                .meta
                .block_height;

            let candidate = match claimed {
                None => self.claim_next_height(event_hash, None).await?,
                Some(height) => match self.blocks.get_by_height(height).await? {
                    Some(block) if block.block.contains_event(event_hash) => {
                        debug!(
                            stage = "extend",
                            event_hash = %event_hash,
                            block_height = height,
                            "Event already written"
                        );
                        return Ok(block);
                    }
                    Some(_) => self.claim_next_height(event_hash, claimed).await?,
                    None => Some(self.successor_below(height, event_hash).await?),
                },
            };

            // The claim moved under us; re-read it.
            let Some(candidate) = candidate else {
                continue;
            };

            attempt += 1;
            let height = candidate.height();
            let meta = BlockMeta {
                block_hash: self.hasher.hash(&candidate)?,
                consensus: true,
                consensus_date: self.now(),
            };

            let err = match self.blocks.add(candidate, meta).await {
                Ok(record) => {
                    metrics::record_block_appended();
                    debug!(
                        stage = "extend",
                        event_hash = %event_hash,
                        block_height = height,
                        attempt,
                        "Block appended"
                    );
                    return Ok(record);
                }
                Err(e) => ConsensusError::from(e),
            };

            if !err.is_conflict() {
                return Err(err);
            }

            metrics::record_append_conflict();
            if !policy.allows_retry(attempt) {
                warn!(
                    stage = "extend",
                    event_hash = %event_hash,
                    attempts = attempt,
                    "Giving up on block append"
                );
                return Err(ConsensusError::AppendRetriesExhausted { attempts: attempt });
            }

            debug!(
                stage = "extend",
                event_hash = %event_hash,
                block_height = height,
                attempt,
                "Height taken by a concurrent writer, retrying"
            );
            let delay = policy.backoff(attempt);
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Claim the height above the latest block, provided the recorded claim
    /// is still `expected`. `None` if it is not.
    async fn claim_next_height(
        &self,
        event_hash: &ContentHash,
        expected: Option<u64>,
    ) -> ConsensusResult<Option<Block>> {
        let latest = self
            .blocks
            .get_latest_summary()
            .await?
            .ok_or(ConsensusError::MissingGenesis)?;

        let candidate = Block::successor_of(&latest, event_hash.clone());
        let claim = vec![MetaPatch::set(MetaChanges {
            block_height: Some(candidate.height()),
            block_order: Some(0),
            ..Default::default()
        })];

        let claimed = self
            .events
            .update_if(event_hash, MetaCondition::BlockHeight(expected), claim)
            .await?;
        Ok(claimed.map(|_| candidate))
    }

    /// Candidate block at an already claimed, still free height.
    async fn successor_below(&self, height: u64, event_hash: &ContentHash) -> ConsensusResult<Block> {
        let below = height.checked_sub(1).ok_or(ConsensusError::MissingGenesis)?;
        let predecessor = self
            .blocks
            .get_by_height(below)
            .await?
            .ok_or(ConsensusError::MissingGenesis)?;
        Ok(Block::successor_of(
            &BlockSummary::from(&predecessor),
            event_hash.clone(),
        ))
    }
}
