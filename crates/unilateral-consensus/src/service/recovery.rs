//! Pending-event recovery
//!
//! An event stays `pending` when its submission died between the persist
//! and finalize stages. Recovery drives it through the remaining stages.
//!
//! A pending event may also belong to a submission that is still running.
//! The extender converges on the block that submission writes, and the
//! conditional finalize lets exactly one of the two commit and announce.

use super::{receipt, ConsensusService};
use crate::domain::{ConsensusResult, SubmissionReceipt};
use crate::ports::{BlockNotifier, BlockStore, EventStore, OperationStore};
use tracing::{debug, info};

impl<E, B, O, N> ConsensusService<E, B, O, N>
where
    E: EventStore,
    B: BlockStore,
    O: OperationStore,
    N: BlockNotifier,
{
    /// Receipts of the events this call committed.
    pub(super) async fn recover(&self) -> ConsensusResult<Vec<SubmissionReceipt>> {
        let pending = self.events.get_pending().await?;
        let mut receipts = Vec::with_capacity(pending.len());

        for record in pending {
            let event_hash = record.meta.event_hash.clone();

            let block = self.extend_chain(&event_hash).await?;
            if self.finalize_event(&record.event, &event_hash).await?.is_none() {
                debug!(event_hash = %event_hash, "Pending event committed by its own submission");
                continue;
            }

            info!(
                event_hash = %event_hash,
                block_height = block.block.height(),
                "Recovered pending event"
            );
            self.announce(&record.event, &block).await?;
            receipts.push(receipt(event_hash, &block));
        }

        Ok(receipts)
    }
}
