//! # Core Domain Entities
//!
//! Defines the ledger records persisted by the commit engine.
//!
//! ## Clusters
//!
//! - **Events**: `Event`, `EventPayload`, `EventMeta`, `MetaPatch`, `MetaCondition`
//! - **Configuration**: `LedgerConfiguration`, `ValidatorDescriptor`
//! - **Operations**: `Operation`, `OperationMeta`
//! - **Chain**: `Block`, `BlockId`, `BlockMeta`, `BlockSummary`, `BlockAdded`

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// JSON-LD context attached to every event and block.
pub const WEBLEDGER_CONTEXT: &str = "https://w3id.org/webledger/v1";

/// Type tag of every block produced by the engine.
pub const EVENT_BLOCK_TYPE: &str = "WebLedgerEventBlock";

/// Consensus method name carried by ledger configurations.
pub const UNILATERAL_CONSENSUS_METHOD: &str = "UnilateralConsensus2017";

/// Separator between the ledger id and the height in a rendered block id.
pub const BLOCK_SEPARATOR: &str = "/blocks/";

/// Unix timestamp in milliseconds.
pub type Timestamp = u64;

// =============================================================================
// CLUSTER A: CONTENT ADDRESSING
// =============================================================================

/// A content address (`urn:sha256:<hex>`) derived from a record's canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an already computed content address.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CLUSTER B: CONFIGURATION
// =============================================================================

/// Kind of ledger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "ConfigurationEvent")]
    Configuration,
    #[serde(rename = "OperationEvent")]
    Operation,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Configuration => f.write_str("ConfigurationEvent"),
            EventType::Operation => f.write_str("OperationEvent"),
        }
    }
}

/// A validator entry in a ledger configuration.
///
/// `validator_type` selects the implementation from the validator registry;
/// every other key is handed to the implementation as a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorDescriptor {
    #[serde(rename = "type")]
    pub validator_type: String,
    /// Event types this validator is restricted to. `None` selects all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_filter: Option<Vec<EventType>>,
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
}

impl ValidatorDescriptor {
    pub fn new(validator_type: impl Into<String>) -> Self {
        Self {
            validator_type: validator_type.into(),
            event_filter: None,
            parameters: Map::new(),
        }
    }

    /// Restrict this validator to the given event types.
    pub fn with_filter(mut self, event_types: Vec<EventType>) -> Self {
        self.event_filter = Some(event_types);
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    /// Whether the event-type filter selects `event_type`.
    pub fn selects(&self, event_type: EventType) -> bool {
        self.event_filter
            .as_ref()
            .map_or(true, |filter| filter.contains(&event_type))
    }
}

/// Ledger configuration carried by configuration events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerConfiguration {
    /// Ledger identifier, also the prefix of every block id.
    pub ledger: String,
    /// Position in the configuration history; genesis is 0.
    pub sequence: u64,
    pub consensus_method: String,
    #[serde(default)]
    pub event_validator: Vec<ValidatorDescriptor>,
    #[serde(default)]
    pub require_event_validation: bool,
}

impl LedgerConfiguration {
    pub fn new(ledger: impl Into<String>, sequence: u64) -> Self {
        Self {
            ledger: ledger.into(),
            sequence,
            consensus_method: UNILATERAL_CONSENSUS_METHOD.to_string(),
            event_validator: Vec::new(),
            require_event_validation: false,
        }
    }

    pub fn with_validator(mut self, descriptor: ValidatorDescriptor) -> Self {
        self.event_validator.push(descriptor);
        self
    }

    pub fn require_event_validation(mut self, required: bool) -> Self {
        self.require_event_validation = required;
        self
    }

    /// Copy of this configuration at the next sequence number.
    pub fn successor(&self) -> Self {
        Self {
            sequence: self.sequence + 1,
            ..self.clone()
        }
    }
}

// =============================================================================
// CLUSTER C: EVENTS
// =============================================================================

/// Event body, tagged by the event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    #[serde(rename = "ConfigurationEvent", rename_all = "camelCase")]
    Configuration {
        ledger_configuration: LedgerConfiguration,
    },
    #[serde(rename = "OperationEvent", rename_all = "camelCase")]
    Operation { operation_hash: Vec<ContentHash> },
}

/// A ledger event as submitted and hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn configuration(configuration: LedgerConfiguration) -> Self {
        Self {
            context: WEBLEDGER_CONTEXT.to_string(),
            payload: EventPayload::Configuration {
                ledger_configuration: configuration,
            },
        }
    }

    pub fn operation(operation_hashes: Vec<ContentHash>) -> Self {
        Self {
            context: WEBLEDGER_CONTEXT.to_string(),
            payload: EventPayload::Operation {
                operation_hash: operation_hashes,
            },
        }
    }

    pub fn event_type(&self) -> EventType {
        match self.payload {
            EventPayload::Configuration { .. } => EventType::Configuration,
            EventPayload::Operation { .. } => EventType::Operation,
        }
    }

    pub fn configuration_payload(&self) -> Option<&LedgerConfiguration> {
        match &self.payload {
            EventPayload::Configuration {
                ledger_configuration,
            } => Some(ledger_configuration),
            EventPayload::Operation { .. } => None,
        }
    }

    pub fn operation_hashes(&self) -> &[ContentHash] {
        match &self.payload {
            EventPayload::Operation { operation_hash } => operation_hash,
            EventPayload::Configuration { .. } => &[],
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.event_type() == EventType::Configuration
    }
}

/// Storage meta attached to an event.
///
/// Every field except `event_hash` may be unset. A committed event has
/// `consensus = Some(true)` and no `pending`; an uncommitted one has
/// `pending = Some(true)` and no `consensus`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    pub event_hash: ContentHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_date: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_configuration: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
}

impl EventMeta {
    /// Meta for a freshly submitted, not yet committed event.
    pub fn pending(event_hash: ContentHash, now: Timestamp) -> Self {
        Self {
            event_hash,
            pending: Some(true),
            created: Some(now),
            ..Default::default()
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending == Some(true)
    }

    pub fn is_committed(&self) -> bool {
        self.consensus == Some(true)
    }

    pub fn is_effective_configuration(&self) -> bool {
        self.effective_configuration == Some(true)
    }

    /// Apply one patch entry in place.
    pub fn apply(&mut self, patch: &MetaPatch) {
        macro_rules! patch_fields {
            ($($field:ident),*) => {
                $(
                    match patch.op {
                        PatchOp::Set => {
                            if let Some(value) = patch.changes.$field {
                                self.$field = Some(value);
                            }
                        }
                        PatchOp::Unset => {
                            if patch.changes.$field.is_some() {
                                self.$field = None;
                            }
                        }
                    }
                )*
            };
        }

        patch_fields!(
            pending,
            consensus,
            consensus_date,
            block_height,
            block_order,
            effective_configuration,
            updated
        );
    }
}

/// Patch operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Set,
    Unset,
}

/// Partial meta subtree named by a patch. For `unset`, only presence matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_date: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_configuration: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
}

/// One entry of an event meta update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaPatch {
    pub op: PatchOp,
    pub changes: MetaChanges,
}

impl MetaPatch {
    pub fn set(changes: MetaChanges) -> Self {
        Self {
            op: PatchOp::Set,
            changes,
        }
    }

    pub fn unset(changes: MetaChanges) -> Self {
        Self {
            op: PatchOp::Unset,
            changes,
        }
    }
}

/// Precondition of a conditional meta update, checked against the stored
/// meta in the same atomic step as the patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCondition {
    /// The event is not committed yet.
    Uncommitted,
    /// The tentative block height still has this value.
    BlockHeight(Option<u64>),
}

impl MetaCondition {
    pub fn holds(&self, meta: &EventMeta) -> bool {
        match self {
            Self::Uncommitted => !meta.is_committed(),
            Self::BlockHeight(height) => meta.block_height == *height,
        }
    }
}

/// An event together with its meta, as held by the event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event: Event,
    pub meta: EventMeta,
}

// =============================================================================
// CLUSTER D: OPERATIONS
// =============================================================================

/// A user operation, stored separately from the event that commits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub operation_type: String,
    pub record: Value,
}

impl Operation {
    pub fn new(operation_type: impl Into<String>, record: Value) -> Self {
        Self {
            operation_type: operation_type.into(),
            record,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMeta {
    pub operation_hash: ContentHash,
    pub event_hash: ContentHash,
    /// Position of the operation within its event.
    pub event_order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation: Operation,
    pub meta: OperationMeta,
}

// =============================================================================
// CLUSTER E: THE CHAIN
// =============================================================================

/// Error parsing a rendered block id.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed block id: {0}")]
pub struct BlockIdParseError(pub String);

/// Structured block identifier.
///
/// Rendered as `<ledger>/blocks/<height>` when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub ledger: String,
    pub height: u64,
}

impl BlockId {
    pub fn new(ledger: impl Into<String>, height: u64) -> Self {
        Self {
            ledger: ledger.into(),
            height,
        }
    }

    pub fn genesis(ledger: impl Into<String>) -> Self {
        Self::new(ledger, 0)
    }

    /// Same ledger, different height.
    pub fn at_height(&self, height: u64) -> Self {
        Self::new(self.ledger.clone(), height)
    }

    pub fn successor(&self) -> Self {
        self.at_height(self.height + 1)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.ledger, BLOCK_SEPARATOR, self.height)
    }
}

impl FromStr for BlockId {
    type Err = BlockIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ledger, height) = s
            .rsplit_once(BLOCK_SEPARATOR)
            .ok_or_else(|| BlockIdParseError(s.to_string()))?;
        if ledger.is_empty() {
            return Err(BlockIdParseError(s.to_string()));
        }
        let height = height
            .parse::<u64>()
            .map_err(|_| BlockIdParseError(s.to_string()))?;
        Ok(Self::new(ledger, height))
    }
}

impl Serialize for BlockId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// A block of the hash-linked chain. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(rename = "@context")]
    pub context: String,
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: String,
    pub block_height: u64,
    /// Hashes of the events committed by this block.
    pub event: Vec<ContentHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_block: Option<BlockId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_block_hash: Option<ContentHash>,
}

impl Block {
    /// The height-0 block of `ledger`, committing the genesis configuration event.
    pub fn genesis(ledger: impl Into<String>, event_hash: ContentHash) -> Self {
        Self {
            context: WEBLEDGER_CONTEXT.to_string(),
            id: BlockId::genesis(ledger),
            block_type: EVENT_BLOCK_TYPE.to_string(),
            block_height: 0,
            event: vec![event_hash],
            previous_block: None,
            previous_block_hash: None,
        }
    }

    /// A candidate block linked to the block described by `predecessor`.
    pub fn successor_of(predecessor: &BlockSummary, event_hash: ContentHash) -> Self {
        Self {
            context: WEBLEDGER_CONTEXT.to_string(),
            id: predecessor.id.at_height(predecessor.block_height + 1),
            block_type: EVENT_BLOCK_TYPE.to_string(),
            block_height: predecessor.block_height + 1,
            event: vec![event_hash],
            previous_block: Some(predecessor.id.clone()),
            previous_block_hash: Some(predecessor.block_hash.clone()),
        }
    }

    pub fn height(&self) -> u64 {
        self.block_height
    }

    pub fn is_genesis(&self) -> bool {
        self.id.height == 0 && self.previous_block.is_none()
    }

    pub fn contains_event(&self, event_hash: &ContentHash) -> bool {
        self.event.contains(event_hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMeta {
    pub block_hash: ContentHash,
    pub consensus: bool,
    pub consensus_date: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub block: Block,
    pub meta: BlockMeta,
}

/// Summary of the highest committed block, used to build the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub id: BlockId,
    pub block_height: u64,
    pub block_hash: ContentHash,
}

impl From<&BlockRecord> for BlockSummary {
    fn from(record: &BlockRecord) -> Self {
        Self {
            id: record.block.id.clone(),
            block_height: record.block.height(),
            block_hash: record.meta.block_hash.clone(),
        }
    }
}

/// Notification emitted once a block and its events are fully committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockAdded {
    pub block_height: u64,
    pub ledger_id: String,
    pub block_hash: ContentHash,
}
