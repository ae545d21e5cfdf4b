//! # Ledger Events
//!
//! Notifications published by the commit engine.

use serde::{Deserialize, Serialize};
use shared_types::{BlockAdded, ContentHash, EventType};

/// All notifications that can be published to the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    // =========================================================================
    // CHAIN
    // =========================================================================
    /// A block was appended and all of its events are committed.
    BlockAdded(BlockAdded),

    // =========================================================================
    // CONFIGURATION
    // =========================================================================
    /// A configuration event became the effective ledger configuration.
    /// Always published after the `BlockAdded` of the block committing it.
    ConfigurationChanged {
        /// Ledger whose configuration changed.
        ledger_id: String,
        /// New configuration sequence.
        sequence: u64,
        /// Height of the block committing the configuration event.
        block_height: u64,
    },

    // =========================================================================
    // VALIDATION
    // =========================================================================
    /// A submitted event was refused by the validator guard.
    EventRejected {
        /// Ledger the event was submitted to.
        ledger_id: String,
        /// Content hash of the rejected event.
        event_hash: ContentHash,
        /// Type of the rejected event.
        event_type: EventType,
        /// Human readable rejection reason.
        reason: String,
    },
}

impl LedgerEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::BlockAdded(_) => EventTopic::Chain,
            Self::ConfigurationChanged { .. } => EventTopic::Configuration,
            Self::EventRejected { .. } => EventTopic::Validation,
        }
    }

    /// Ledger this event belongs to.
    #[must_use]
    pub fn ledger_id(&self) -> &str {
        match self {
            Self::BlockAdded(added) => &added.ledger_id,
            Self::ConfigurationChanged { ledger_id, .. }
            | Self::EventRejected { ledger_id, .. } => ledger_id,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Block appends.
    Chain,
    /// Effective configuration changes.
    Configuration,
    /// Guard rejections.
    Validation,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Ledgers to include. Empty means all ledgers.
    pub ledgers: Vec<String>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            ledgers: Vec::new(),
        }
    }

    /// Restrict the filter to a single ledger.
    #[must_use]
    pub fn for_ledger(mut self, ledger_id: impl Into<String>) -> Self {
        self.ledgers.push(ledger_id.into());
        self
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let ledger_match =
            self.ledgers.is_empty() || self.ledgers.iter().any(|l| l == event.ledger_id());

        topic_match && ledger_match
    }
}

#[cfg(test)]
pub(crate) fn block_added(ledger_id: &str, block_height: u64) -> LedgerEvent {
    LedgerEvent::BlockAdded(BlockAdded {
        block_height,
        ledger_id: ledger_id.to_string(),
        block_hash: ContentHash::new(format!("urn:sha256:{block_height:064x}")),
    })
}
