//! In-memory record stores
//!
//! Each store guards its map with a single `parking_lot::RwLock`, so every
//! store call, including a multi-patch meta update or a batch insert, is
//! atomic with respect to every other call on the same store.

use crate::ports::{BlockStore, EventStore, OperationStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{
    Block, BlockId, BlockMeta, BlockRecord, BlockSummary, ContentHash, Event, EventMeta,
    EventRecord, MetaCondition, MetaPatch, OperationRecord, StoreError,
};
use std::collections::{BTreeMap, HashMap, HashSet};

const EVENT_COLLECTION: &str = "event";
const BLOCK_COLLECTION: &str = "block";
const OPERATION_COLLECTION: &str = "operation";

/// In-memory event store keyed by event hash.
#[derive(Default)]
pub struct InMemoryEventStore {
    records: RwLock<HashMap<ContentHash, EventRecord>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Snapshot of every stored record.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.read().values().cloned().collect()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn add(&self, event: Event, meta: EventMeta) -> Result<EventRecord, StoreError> {
        let mut records = self.records.write();
        if records.contains_key(&meta.event_hash) {
            return Err(StoreError::duplicate(EVENT_COLLECTION, &meta.event_hash));
        }
        let record = EventRecord { event, meta };
        records.insert(record.meta.event_hash.clone(), record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        event_hash: &ContentHash,
        patches: Vec<MetaPatch>,
    ) -> Result<EventMeta, StoreError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(event_hash)
            .ok_or_else(|| StoreError::not_found(EVENT_COLLECTION, event_hash))?;
        for patch in &patches {
            record.meta.apply(patch);
        }
        Ok(record.meta.clone())
    }

    async fn update_if(
        &self,
        event_hash: &ContentHash,
        condition: MetaCondition,
        patches: Vec<MetaPatch>,
    ) -> Result<Option<EventMeta>, StoreError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(event_hash)
            .ok_or_else(|| StoreError::not_found(EVENT_COLLECTION, event_hash))?;
        if !condition.holds(&record.meta) {
            return Ok(None);
        }
        for patch in &patches {
            record.meta.apply(patch);
        }
        Ok(Some(record.meta.clone()))
    }

    async fn get(&self, event_hash: &ContentHash) -> Result<Option<EventRecord>, StoreError> {
        Ok(self.records.read().get(event_hash).cloned())
    }

    async fn get_latest_config(&self) -> Result<Option<EventRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.event.is_configuration() && r.meta.is_effective_configuration())
            .max_by_key(|r| r.meta.block_height)
            .cloned())
    }

    async fn get_pending(&self) -> Result<Vec<EventRecord>, StoreError> {
        let mut pending: Vec<EventRecord> = self
            .records
            .read()
            .values()
            .filter(|r| r.meta.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.meta
                .created
                .cmp(&b.meta.created)
                .then_with(|| a.meta.event_hash.cmp(&b.meta.event_hash))
        });
        Ok(pending)
    }
}

/// In-memory block store with a unique `(ledger, height)` key.
///
/// Blocks are grouped per ledger and ordered by height, so height lookups
/// and the latest block are keyed reads.
#[derive(Default)]
pub struct InMemoryBlockStore {
    chains: RwLock<BTreeMap<String, BTreeMap<u64, BlockRecord>>>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chains.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored block, ordered by ledger then height.
    pub fn records(&self) -> Vec<BlockRecord> {
        self.chains
            .read()
            .values()
            .flat_map(|chain| chain.values().cloned())
            .collect()
    }
}

#[async_trait]
impl BlockStore for InMemoryBlockStore {
    async fn add(&self, block: Block, meta: BlockMeta) -> Result<BlockRecord, StoreError> {
        let height = block.height();
        let mut chains = self.chains.write();
        let chain = chains.entry(block.id.ledger.clone()).or_default();
        if chain.contains_key(&height) {
            let key = BlockId::new(block.id.ledger.clone(), height);
            return Err(StoreError::duplicate(BLOCK_COLLECTION, &key));
        }
        let record = BlockRecord { block, meta };
        chain.insert(height, record.clone());
        Ok(record)
    }

    async fn get_latest_summary(&self) -> Result<Option<BlockSummary>, StoreError> {
        Ok(self
            .chains
            .read()
            .values()
            .filter_map(|chain| chain.last_key_value())
            .max_by_key(|(height, _)| **height)
            .map(|(_, record)| BlockSummary::from(record)))
    }

    async fn get_by_height(&self, height: u64) -> Result<Option<BlockRecord>, StoreError> {
        Ok(self
            .chains
            .read()
            .values()
            .find_map(|chain| chain.get(&height))
            .cloned())
    }
}

/// In-memory operation store keyed by operation hash.
#[derive(Default)]
pub struct InMemoryOperationStore {
    records: RwLock<HashMap<ContentHash, OperationRecord>>,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn add_many(&self, records: Vec<OperationRecord>) -> Result<(), StoreError> {
        let mut stored = self.records.write();

        let mut batch = HashSet::with_capacity(records.len());
        for record in &records {
            let hash = &record.meta.operation_hash;
            if stored.contains_key(hash) || !batch.insert(hash) {
                return Err(StoreError::duplicate(OPERATION_COLLECTION, hash));
            }
        }

        for record in records {
            stored.insert(record.meta.operation_hash.clone(), record);
        }
        Ok(())
    }

    async fn get(
        &self,
        operation_hash: &ContentHash,
    ) -> Result<Option<OperationRecord>, StoreError> {
        Ok(self.records.read().get(operation_hash).cloned())
    }
}
