//! Notification adapters
//!
//! Implement the `BlockNotifier` port on top of the shared ledger bus, plus a
//! recording notifier for embedding and tests.

use crate::ports::BlockNotifier;
use async_trait::async_trait;
use shared_bus::{EventPublisher, LedgerEvent};
use shared_types::{BlockAdded, ContentHash, EventType};
use std::sync::Arc;
use tracing::trace;

/// Publishes engine notifications on the shared bus.
pub struct SharedBusNotifier {
    bus: Arc<dyn EventPublisher>,
}

impl SharedBusNotifier {
    pub fn new(bus: Arc<dyn EventPublisher>) -> Self {
        Self { bus }
    }

    async fn publish(&self, event: LedgerEvent) -> Result<(), String> {
        let receivers = self.bus.publish(event).await;
        trace!(receivers, "Notification published");
        Ok(())
    }
}

#[async_trait]
impl BlockNotifier for SharedBusNotifier {
    async fn block_added(&self, notification: BlockAdded) -> Result<(), String> {
        self.publish(LedgerEvent::BlockAdded(notification)).await
    }

    async fn configuration_changed(
        &self,
        ledger_id: &str,
        sequence: u64,
        block_height: u64,
    ) -> Result<(), String> {
        self.publish(LedgerEvent::ConfigurationChanged {
            ledger_id: ledger_id.to_string(),
            sequence,
            block_height,
        })
        .await
    }

    async fn event_rejected(
        &self,
        ledger_id: &str,
        event_hash: &ContentHash,
        event_type: EventType,
        reason: &str,
    ) -> Result<(), String> {
        self.publish(LedgerEvent::EventRejected {
            ledger_id: ledger_id.to_string(),
            event_hash: event_hash.clone(),
            event_type,
            reason: reason.to_string(),
        })
        .await
    }
}

/// Keeps every notification in memory, in emission order.
#[derive(Default)]
pub struct RecordingNotifier {
    events: parking_lot::RwLock<Vec<LedgerEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.read().clone()
    }

    pub fn event_count(&self) -> usize {
        self.events.read().len()
    }

    /// Recorded `BlockAdded` notifications only.
    pub fn blocks_added(&self) -> Vec<BlockAdded> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e {
                LedgerEvent::BlockAdded(added) => Some(added.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BlockNotifier for RecordingNotifier {
    async fn block_added(&self, notification: BlockAdded) -> Result<(), String> {
        self.events.write().push(LedgerEvent::BlockAdded(notification));
        Ok(())
    }

    async fn configuration_changed(
        &self,
        ledger_id: &str,
        sequence: u64,
        block_height: u64,
    ) -> Result<(), String> {
        self.events.write().push(LedgerEvent::ConfigurationChanged {
            ledger_id: ledger_id.to_string(),
            sequence,
            block_height,
        });
        Ok(())
    }

    async fn event_rejected(
        &self,
        ledger_id: &str,
        event_hash: &ContentHash,
        event_type: EventType,
        reason: &str,
    ) -> Result<(), String> {
        self.events.write().push(LedgerEvent::EventRejected {
            ledger_id: ledger_id.to_string(),
            event_hash: event_hash.clone(),
            event_type,
            reason: reason.to_string(),
        });
        Ok(())
    }
}
