//! # Shared Bus - Ledger Notification Channel
//!
//! Carries notifications from the commit engine to downstream consumers
//! (indexers, replicators, API layers).
//!
//! ## Delivery Contract
//!
//! - `BlockAdded` is published only after the block is durably written AND
//!   every event it commits has been flipped from pending to committed.
//!   A consumer may read any record tied to that block the instant it
//!   observes the notification.
//! - Delivery is best-effort broadcast: subscribers that fall behind by more
//!   than the channel capacity skip the oldest notifications.
//!
//! ```text
//! ┌──────────────────┐                    ┌──────────────┐
//! │  Commit Engine   │                    │  Consumer    │
//! │  (finalize)      │    publish()       │              │
//! │                  │ ──────┐            │              │
//! └──────────────────┘       │            └──────────────┘
//!                            ▼                    ↑
//!                      ┌──────────────┐          │
//!                      │  Ledger Bus  │          │
//!                      │              │ ─────────┘
//!                      └──────────────┘  subscribe()
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, LedgerEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum notifications to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
