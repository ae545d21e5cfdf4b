//! Built-in validators

use super::{CandidateEvent, EventValidator};
use crate::domain::ValidatorVerdict;
use async_trait::async_trait;
use shared_crypto::canonicalize;
use shared_types::{EventType, ValidatorDescriptor};

/// Restricts operation events to an allow-list of operation types.
///
/// Descriptor parameter: `allowedOperationTypes: [string]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OperationTypeGuard;

impl OperationTypeGuard {
    pub const TYPE: &'static str = "OperationTypeGuard";
    pub const ALLOWED_TYPES: &'static str = "allowedOperationTypes";
}

#[async_trait]
impl EventValidator for OperationTypeGuard {
    fn validator_type(&self) -> &str {
        Self::TYPE
    }

    async fn applies_to(&self, candidate: &CandidateEvent, _: &ValidatorDescriptor) -> bool {
        candidate.event.event_type() == EventType::Operation
    }

    async fn validate(
        &self,
        candidate: &CandidateEvent,
        descriptor: &ValidatorDescriptor,
    ) -> ValidatorVerdict {
        let Some(allowed) = descriptor
            .parameter(Self::ALLOWED_TYPES)
            .and_then(|v| v.as_array())
        else {
            return ValidatorVerdict::invalid(format!(
                "{} parameter must be a list of operation types",
                Self::ALLOWED_TYPES
            ));
        };

        let refused: Vec<&str> = candidate
            .operations
            .iter()
            .map(|op| op.operation_type.as_str())
            .filter(|ty| !allowed.iter().any(|a| a.as_str() == Some(*ty)))
            .collect();

        if refused.is_empty() {
            ValidatorVerdict::valid()
        } else {
            ValidatorVerdict::invalid(format!(
                "operation type not allowed: {}",
                refused.join(", ")
            ))
        }
    }
}

/// Caps the canonical size of an event together with its operations.
///
/// Descriptor parameter: `maxBytes: integer`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordSizeGuard;

impl RecordSizeGuard {
    pub const TYPE: &'static str = "RecordSizeGuard";
    pub const MAX_BYTES: &'static str = "maxBytes";

    fn canonical_size(candidate: &CandidateEvent) -> Result<usize, String> {
        let mut size = canonicalize(&candidate.event)
            .map_err(|e| e.to_string())?
            .len();
        for operation in &candidate.operations {
            size += canonicalize(operation).map_err(|e| e.to_string())?.len();
        }
        Ok(size)
    }
}

#[async_trait]
impl EventValidator for RecordSizeGuard {
    fn validator_type(&self) -> &str {
        Self::TYPE
    }

    async fn applies_to(&self, _: &CandidateEvent, _: &ValidatorDescriptor) -> bool {
        true
    }

    async fn validate(
        &self,
        candidate: &CandidateEvent,
        descriptor: &ValidatorDescriptor,
    ) -> ValidatorVerdict {
        let Some(max_bytes) = descriptor.parameter(Self::MAX_BYTES).and_then(|v| v.as_u64())
        else {
            return ValidatorVerdict::invalid(format!(
                "{} parameter must be a non-negative integer",
                Self::MAX_BYTES
            ));
        };

        match Self::canonical_size(candidate) {
            Ok(size) if size as u64 <= max_bytes => ValidatorVerdict::valid(),
            Ok(size) => ValidatorVerdict::invalid(format!(
                "canonical size {size} exceeds {max_bytes} bytes"
            )),
            Err(reason) => ValidatorVerdict::invalid(reason),
        }
    }
}
