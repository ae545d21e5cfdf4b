use serde::{Deserialize, Serialize};
use shared_types::ContentHash;

/// Outcome of a committed submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub event_hash: ContentHash,
    pub block_height: u64,
    pub block_hash: ContentHash,
}

/// Options for configuration submissions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Bootstrap the ledger with this configuration as block 0.
    pub genesis: bool,
}

impl SubmitOptions {
    pub fn genesis() -> Self {
        Self { genesis: true }
    }
}
