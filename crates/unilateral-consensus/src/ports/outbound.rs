//! Driven ports (Outbound dependencies)
//!
//! Uniqueness is the only coordination primitive the engine relies on:
//! concurrent writers race on `BlockStore::add` and the store must reject
//! all but one insert per `(ledger, height)`.

use async_trait::async_trait;
use shared_types::{
    Block, BlockAdded, BlockMeta, BlockRecord, BlockSummary, ContentHash, Event, EventMeta,
    EventRecord, EventType, MetaCondition, MetaPatch, OperationRecord, StoreError, Timestamp,
};

/// Event records and their meta.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a new event. `Duplicate` if its hash is already stored.
    async fn add(&self, event: Event, meta: EventMeta) -> Result<EventRecord, StoreError>;

    /// Apply patches to an event's meta as one atomic update.
    async fn update(
        &self,
        event_hash: &ContentHash,
        patches: Vec<MetaPatch>,
    ) -> Result<EventMeta, StoreError>;

    /// Apply patches only while `condition` holds for the stored meta. The
    /// check and the patches form one atomic update; `Ok(None)` means the
    /// condition failed and nothing changed.
    async fn update_if(
        &self,
        event_hash: &ContentHash,
        condition: MetaCondition,
        patches: Vec<MetaPatch>,
    ) -> Result<Option<EventMeta>, StoreError>;

    async fn get(&self, event_hash: &ContentHash) -> Result<Option<EventRecord>, StoreError>;

    /// Most recent configuration event marked effective.
    async fn get_latest_config(&self) -> Result<Option<EventRecord>, StoreError>;

    /// Events still pending, oldest first.
    async fn get_pending(&self) -> Result<Vec<EventRecord>, StoreError>;
}

/// Blocks, unique by `(ledger, height)`.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Insert-if-absent. `Duplicate` if the height is taken.
    async fn add(&self, block: Block, meta: BlockMeta) -> Result<BlockRecord, StoreError>;

    async fn get_latest_summary(&self) -> Result<Option<BlockSummary>, StoreError>;

    async fn get_by_height(&self, height: u64) -> Result<Option<BlockRecord>, StoreError>;
}

/// Operation payloads, keyed by operation hash.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Insert all records or none. `Duplicate` if any hash is taken.
    async fn add_many(&self, records: Vec<OperationRecord>) -> Result<(), StoreError>;

    async fn get(&self, operation_hash: &ContentHash)
        -> Result<Option<OperationRecord>, StoreError>;
}

/// Downstream notification channel.
///
/// `block_added` must only be called after the block's events are committed.
#[async_trait]
pub trait BlockNotifier: Send + Sync {
    async fn block_added(&self, notification: BlockAdded) -> Result<(), String>;

    async fn configuration_changed(
        &self,
        ledger_id: &str,
        sequence: u64,
        block_height: u64,
    ) -> Result<(), String>;

    async fn event_rejected(
        &self,
        ledger_id: &str,
        event_hash: &ContentHash,
        event_type: EventType,
        reason: &str,
    ) -> Result<(), String>;
}

/// Time source for meta timestamps
pub trait TimeSource: Send + Sync {
    /// Current unix time in milliseconds
    fn now(&self) -> Timestamp;
}

/// Default time source using system time
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}
