//! # Event Guard
//!
//! Admission control in front of the commit pipeline.
//!
//! A ledger configuration lists validator descriptors. The registry maps each
//! descriptor's `type` to an [`EventValidator`] implementation once per
//! configuration load, producing an [`EventGuard`]. The guard then runs every
//! selected validator concurrently and folds their outcomes into a
//! [`ValidationReport`]:
//!
//! ```text
//!                ┌──────────────┐
//!  candidate ──→ │  EventGuard  │──┬──→ validator A ──┐
//!                └──────────────┘  ├──→ validator B ──┼──→ ValidationReport
//!                                  └──→ validator C ──┘
//! ```
//!
//! Validators share no state and are not ordered relative to each other.

mod builtins;

pub use builtins::{OperationTypeGuard, RecordSizeGuard};

use crate::domain::{
    ConsensusError, ConsensusResult, ValidationReport, ValidatorOutcome, ValidatorVerdict,
};
use async_trait::async_trait;
use futures::future::join_all;
use shared_types::{Event, LedgerConfiguration, Operation, ValidatorDescriptor};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// An event offered to the guard, with the operation payloads it references.
#[derive(Clone, Debug)]
pub struct CandidateEvent {
    pub event: Event,
    /// Empty for configuration events.
    pub operations: Vec<Operation>,
}

impl CandidateEvent {
    pub fn configuration(event: Event) -> Self {
        Self {
            event,
            operations: Vec::new(),
        }
    }

    pub fn operation(event: Event, operations: Vec<Operation>) -> Self {
        Self { event, operations }
    }
}

/// A pluggable event validator.
///
/// `applies_to` decides whether the validator claims the event at all;
/// `validate` is only called for claimed events.
#[async_trait]
pub trait EventValidator: Send + Sync {
    /// Registry key, matched against `ValidatorDescriptor::validator_type`.
    fn validator_type(&self) -> &str;

    async fn applies_to(&self, candidate: &CandidateEvent, descriptor: &ValidatorDescriptor)
        -> bool;

    async fn validate(
        &self,
        candidate: &CandidateEvent,
        descriptor: &ValidatorDescriptor,
    ) -> ValidatorVerdict;
}

/// Validator type → implementation.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<dyn EventValidator>>,
}

impl ValidatorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in validators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(OperationTypeGuard));
        registry.register(Arc::new(RecordSizeGuard));
        registry
    }

    /// Register an implementation, replacing any previous one of that type.
    pub fn register(
        &mut self,
        validator: Arc<dyn EventValidator>,
    ) -> Option<Arc<dyn EventValidator>> {
        self.validators
            .insert(validator.validator_type().to_string(), validator)
    }

    pub fn contains(&self, validator_type: &str) -> bool {
        self.validators.contains_key(validator_type)
    }

    /// Registered validator types, sorted.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Bind every descriptor of a configuration to its implementation.
    pub fn resolve(&self, configuration: &LedgerConfiguration) -> ConsensusResult<EventGuard> {
        let bindings = configuration
            .event_validator
            .iter()
            .map(|descriptor| {
                self.validators
                    .get(&descriptor.validator_type)
                    .map(|validator| GuardBinding {
                        descriptor: descriptor.clone(),
                        validator: Arc::clone(validator),
                    })
                    .ok_or_else(|| {
                        ConsensusError::UnknownValidator(descriptor.validator_type.clone())
                    })
            })
            .collect::<ConsensusResult<Vec<_>>>()?;

        Ok(EventGuard {
            require_event_validation: configuration.require_event_validation,
            bindings,
        })
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("types", &self.types())
            .finish()
    }
}

struct GuardBinding {
    descriptor: ValidatorDescriptor,
    validator: Arc<dyn EventValidator>,
}

/// Validators of one configuration, ready to evaluate events.
pub struct EventGuard {
    require_event_validation: bool,
    bindings: Vec<GuardBinding>,
}

impl EventGuard {
    /// Run every selected validator and report on all of them.
    pub async fn evaluate(&self, candidate: &CandidateEvent) -> ValidationReport {
        let event_type = candidate.event.event_type();

        let checks = self.bindings.iter().map(|binding| async move {
            let validator_type = binding.descriptor.validator_type.clone();
            if !binding.descriptor.selects(event_type) {
                return ValidatorOutcome::skipped(validator_type);
            }
            if !binding
                .validator
                .applies_to(candidate, &binding.descriptor)
                .await
            {
                return ValidatorOutcome::not_applicable(validator_type);
            }
            let verdict = binding.validator.validate(candidate, &binding.descriptor).await;
            ValidatorOutcome::judged(validator_type, verdict)
        });
        let outcomes = join_all(checks).await;

        let report = ValidationReport {
            event_type,
            require_event_validation: self.require_event_validation,
            outcomes,
        };
        debug!(
            event_type = %event_type,
            validators = report.outcomes.len(),
            applicable = report.applicable().count(),
            valid = report.is_valid(),
            "Guard evaluated event"
        );
        report
    }

    /// Evaluate and turn a rejection into an error carrying the report.
    pub async fn check(&self, candidate: &CandidateEvent) -> ConsensusResult<ValidationReport> {
        let report = self.evaluate(candidate).await;
        if report.is_valid() {
            Ok(report)
        } else {
            Err(ConsensusError::Validation(report))
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
