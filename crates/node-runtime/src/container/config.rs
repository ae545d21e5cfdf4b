//! # Node Configuration
//!
//! Runtime parameters of the ledger node, with defaults suitable for a local
//! single-process ledger. Every field can be overridden from the environment:
//!
//! | Variable                     | Field                                  |
//! |------------------------------|----------------------------------------|
//! | `UL_LEDGER_ID`               | `ledger.ledger_id`                     |
//! | `UL_REQUIRE_EVENT_VALIDATION`| `ledger.require_event_validation`      |
//! | `UL_ALLOWED_OPERATION_TYPES` | `ledger.allowed_operation_types` (csv) |
//! | `UL_MAX_RECORD_BYTES`        | `ledger.max_record_bytes`              |
//! | `UL_MAX_APPEND_ATTEMPTS`     | `append.max_attempts` (0 = unbounded)  |
//! | `UL_APPEND_BACKOFF_MS`       | `append.initial_backoff_ms`            |
//! | `UL_BUS_CAPACITY`            | `bus.capacity`                         |
//! | `UL_DEMO_OPERATIONS`         | `demo_operations`                      |

use std::time::Duration;

use serde_json::json;
use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use shared_types::{LedgerConfiguration, ValidatorDescriptor};
use thiserror::Error;
use unilateral_consensus::{
    AppendRetryPolicy, ConsensusConfig, OperationTypeGuard, RecordSizeGuard,
};

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Genesis ledger configuration.
    pub ledger: LedgerConfig,
    /// Append loop tuning.
    pub append: AppendConfig,
    /// Ledger bus configuration.
    pub bus: BusConfig,
    /// Operations submitted at startup, for smoke testing a fresh node.
    pub demo_operations: usize,
}

impl NodeConfig {
    /// Defaults overridden by `UL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `UL_*` key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ledger_id) = lookup("UL_LEDGER_ID") {
            config.ledger.ledger_id = ledger_id;
        }
        if let Some(value) = lookup("UL_REQUIRE_EVENT_VALIDATION") {
            config.ledger.require_event_validation =
                parse_flag("UL_REQUIRE_EVENT_VALIDATION", &value)?;
        }
        if let Some(value) = lookup("UL_ALLOWED_OPERATION_TYPES") {
            config.ledger.allowed_operation_types = value
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(value) = lookup("UL_MAX_RECORD_BYTES") {
            config.ledger.max_record_bytes = Some(parse_number("UL_MAX_RECORD_BYTES", &value)?);
        }
        if let Some(value) = lookup("UL_MAX_APPEND_ATTEMPTS") {
            config.append.max_attempts = parse_number("UL_MAX_APPEND_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("UL_APPEND_BACKOFF_MS") {
            config.append.initial_backoff_ms = parse_number("UL_APPEND_BACKOFF_MS", &value)?;
        }
        if let Some(value) = lookup("UL_BUS_CAPACITY") {
            config.bus.capacity = parse_number("UL_BUS_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("UL_DEMO_OPERATIONS") {
            config.demo_operations = parse_number("UL_DEMO_OPERATIONS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the node cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.ledger_id.trim().is_empty() {
            return Err(ConfigError::EmptyLedgerId);
        }
        if self.ledger.ledger_id.contains(shared_types::BLOCK_SEPARATOR) {
            return Err(ConfigError::InvalidLedgerId(self.ledger.ledger_id.clone()));
        }
        // Only the size guard claims configuration events, so without it a
        // validation-required genesis can never be accepted.
        if self.ledger.require_event_validation && self.ledger.max_record_bytes.is_none() {
            return Err(ConfigError::UnclaimedGenesis);
        }
        if self.bus.capacity == 0 {
            return Err(ConfigError::ZeroBusCapacity);
        }
        if self.append.max_backoff_ms < self.append.initial_backoff_ms {
            return Err(ConfigError::BackoffRange {
                initial: self.append.initial_backoff_ms,
                max: self.append.max_backoff_ms,
            });
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ledger id must not be empty")]
    EmptyLedgerId,

    #[error("ledger id {0:?} must not contain the block path separator")]
    InvalidLedgerId(String),

    #[error("event validation is required but no validator claims the genesis event")]
    UnclaimedGenesis,

    #[error("bus capacity must be at least 1")]
    ZeroBusCapacity,

    #[error("max backoff {max}ms is below initial backoff {initial}ms")]
    BackoffRange { initial: u64, max: u64 },

    #[error("{key}: cannot parse {value:?}")]
    Parse { key: String, value: String },
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Parse {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Parse {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Genesis ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Ledger identifier and block id prefix.
    pub ledger_id: String,
    /// Reject events no configured validator claims.
    pub require_event_validation: bool,
    /// Installs an `OperationTypeGuard` when non-empty.
    pub allowed_operation_types: Vec<String>,
    /// Installs a `RecordSizeGuard` when set.
    pub max_record_bytes: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ledger_id: "did:v1:uuid:local-ledger".to_string(),
            require_event_validation: false,
            allowed_operation_types: Vec::new(),
            max_record_bytes: None,
        }
    }
}

impl LedgerConfig {
    /// Sequence 0 configuration submitted as the genesis event.
    pub fn genesis_configuration(&self) -> LedgerConfiguration {
        let mut configuration = LedgerConfiguration::new(self.ledger_id.clone(), 0)
            .require_event_validation(self.require_event_validation);

        if !self.allowed_operation_types.is_empty() {
            configuration = configuration.with_validator(
                ValidatorDescriptor::new(OperationTypeGuard::TYPE).with_parameter(
                    OperationTypeGuard::ALLOWED_TYPES,
                    json!(self.allowed_operation_types),
                ),
            );
        }
        if let Some(max_bytes) = self.max_record_bytes {
            configuration = configuration.with_validator(
                ValidatorDescriptor::new(RecordSizeGuard::TYPE)
                    .with_parameter(RecordSizeGuard::MAX_BYTES, json!(max_bytes)),
            );
        }

        configuration
    }
}

/// Append loop tuning.
#[derive(Debug, Clone)]
pub struct AppendConfig {
    /// Insert attempts per event; 0 retries forever.
    pub max_attempts: u32,
    /// First backoff after a height conflict; 0 yields instead of sleeping.
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for AppendConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1000,
            initial_backoff_ms: 0,
            max_backoff_ms: 50,
        }
    }
}

impl AppendConfig {
    /// Commit engine configuration for these settings.
    pub fn consensus_config(&self) -> ConsensusConfig {
        let max_attempts = match self.max_attempts {
            0 => None,
            n => Some(n),
        };
        ConsensusConfig {
            retry: AppendRetryPolicy {
                max_attempts,
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.max_backoff_ms),
            },
            ..ConsensusConfig::default()
        }
    }
}

/// Ledger bus configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Notifications buffered per subscriber before it lags.
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}
