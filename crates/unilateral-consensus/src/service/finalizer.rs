//! Commit finalizer

use super::ConsensusService;
use crate::domain::{ConsensusError, ConsensusResult};
use crate::ports::{BlockNotifier, BlockStore, EventStore, OperationStore};
use shared_types::{
    BlockAdded, BlockRecord, ContentHash, Event, EventMeta, MetaChanges, MetaCondition, MetaPatch,
};
use tracing::debug;

impl<E, B, O, N> ConsensusService<E, B, O, N>
where
    E: EventStore,
    B: BlockStore,
    O: OperationStore,
    N: BlockNotifier,
{
    /// Flip the event from pending to committed in one store update.
    ///
    /// Only the first caller for an event gets `Some`; a concurrent writer
    /// that finds it already committed gets `None` and must not announce it.
    pub(super) async fn finalize_event(
        &self,
        event: &Event,
        event_hash: &ContentHash,
    ) -> ConsensusResult<Option<EventMeta>> {
        let now = self.now();
        let patches = vec![
            MetaPatch::unset(MetaChanges {
                pending: Some(true),
                ..Default::default()
            }),
            MetaPatch::set(MetaChanges {
                consensus: Some(true),
                consensus_date: Some(now),
                updated: Some(now),
                effective_configuration: event.is_configuration().then_some(true),
                ..Default::default()
            }),
        ];

        let meta = self
            .events
            .update_if(event_hash, MetaCondition::Uncommitted, patches)
            .await?;
        match meta {
            Some(_) => debug!(stage = "finalize", event_hash = %event_hash, "Event committed"),
            None => debug!(stage = "finalize", event_hash = %event_hash, "Event already committed"),
        }
        Ok(meta)
    }

    /// Notify stage. Only called once the block's event is committed.
    pub(super) async fn announce(&self, event: &Event, block: &BlockRecord) -> ConsensusResult<()> {
        let block_height = block.block.height();

        self.notifier
            .block_added(BlockAdded {
                block_height,
                ledger_id: block.block.id.ledger.clone(),
                block_hash: block.meta.block_hash.clone(),
            })
            .await
            .map_err(ConsensusError::Notification)?;

        if let Some(configuration) = event.configuration_payload() {
            self.notifier
                .configuration_changed(&configuration.ledger, configuration.sequence, block_height)
                .await
                .map_err(ConsensusError::Notification)?;
        }

        debug!(stage = "notify", block_height, "Block announced");
        Ok(())
    }
}
