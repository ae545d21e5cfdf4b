//! Error types for the commit engine

use super::ValidationReport;
use shared_crypto::CryptoError;
use shared_types::StoreError;

/// Malformed submissions, rejected before the pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("Configuration targets ledger {submitted}, current ledger is {current}")]
    LedgerMismatch { current: String, submitted: String },

    #[error("Configuration sequence must be {expected}, got {actual}")]
    NonSequentialConfiguration { expected: u64, actual: u64 },

    #[error("Genesis configuration sequence must be 0, got {0}")]
    InvalidGenesisSequence(u64),
}

/// Commit engine error types
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    /// A uniqueness violation outside the append loop, such as the same
    /// event or operation being submitted twice.
    #[error("Record already exists: {0}")]
    Conflict(StoreError),

    #[error("Event validation failed: {}", .0.summary())]
    Validation(ValidationReport),

    #[error("Malformed submission: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("Storage failure: {0}")]
    Storage(StoreError),

    #[error("No event validator registered for type {0}")]
    UnknownValidator(String),

    #[error("No effective ledger configuration")]
    MissingConfiguration,

    #[error("Missing genesis block")]
    MissingGenesis,

    #[error("Genesis block already exists for ledger {0}")]
    GenesisExists(String),

    #[error("Block append gave up after {attempts} conflicting attempts")]
    AppendRetriesExhausted { attempts: u32 },

    #[error("Hashing failed: {0}")]
    Hashing(#[from] CryptoError),

    /// The block is committed; only the downstream notification failed.
    #[error("Notification failed: {0}")]
    Notification(String),
}

impl ConsensusError {
    /// Retry predicate of the append loop.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Errors caused by the submitted content rather than the engine.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Syntax(_) | Self::Conflict(_)
        )
    }

    /// Short, stable label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation",
            Self::Syntax(_) => "syntax",
            Self::Storage(_) => "storage",
            Self::UnknownValidator(_) => "unknown_validator",
            Self::MissingConfiguration => "missing_configuration",
            Self::MissingGenesis => "missing_genesis",
            Self::GenesisExists(_) => "genesis_exists",
            Self::AppendRetriesExhausted { .. } => "retries_exhausted",
            Self::Hashing(_) => "hashing",
            Self::Notification(_) => "notification",
        }
    }
}

impl From<StoreError> for ConsensusError {
    fn from(err: StoreError) -> Self {
        if err.is_duplicate() {
            Self::Conflict(err)
        } else {
            Self::Storage(err)
        }
    }
}

/// Result type for commit engine operations
pub type ConsensusResult<T> = Result<T, ConsensusError>;
