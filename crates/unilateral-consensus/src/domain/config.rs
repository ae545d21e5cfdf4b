//! Engine configuration

use shared_types::UNILATERAL_CONSENSUS_METHOD;
use std::time::Duration;

/// Retry policy of the chain extender's append loop.
///
/// Only duplicate-key conflicts consume attempts; every other failure aborts
/// immediately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppendRetryPolicy {
    /// Maximum insert attempts per event. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Delay after the first conflict. Zero retries immediately.
    pub initial_backoff: Duration,
    /// Upper bound of the doubling backoff.
    pub max_backoff: Duration,
}

impl AppendRetryPolicy {
    /// Retry until success.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            ..Self::default()
        }
    }

    /// Bounded policy with immediate retries.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            ..Self::default()
        }
    }

    /// Whether another attempt may follow `attempts` failed ones.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }

    /// Delay before the attempt following `conflicts` consecutive conflicts.
    pub fn backoff(&self, conflicts: u32) -> Duration {
        if self.initial_backoff.is_zero() || conflicts == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32
            .checked_shl(conflicts.saturating_sub(1).min(31))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for AppendRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(1000),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::from_millis(50),
        }
    }
}

/// Commit engine configuration
#[derive(Clone, Debug)]
pub struct ConsensusConfig {
    /// Consensus method name this engine registers under.
    pub method: String,
    /// Append loop retry policy.
    pub retry: AppendRetryPolicy,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            method: UNILATERAL_CONSENSUS_METHOD.to_string(),
            retry: AppendRetryPolicy::default(),
        }
    }
}
