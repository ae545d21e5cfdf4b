//! Guard diagnostics
//!
//! A report lists every validator descriptor of the governing configuration,
//! in configuration order, with what happened to it. Rejections always carry
//! the complete report.

use serde::{Deserialize, Serialize};
use shared_types::EventType;

/// Verdict of a single validator that claimed an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorVerdict {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidatorVerdict {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// What one configured validator did with the event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorOutcome {
    pub validator_type: String,
    /// The descriptor's event filter admitted the event type.
    pub selected: bool,
    /// The validator claimed the event.
    pub applicable: bool,
    /// Present only for applicable validators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<ValidatorVerdict>,
}

impl ValidatorOutcome {
    pub fn skipped(validator_type: impl Into<String>) -> Self {
        Self {
            validator_type: validator_type.into(),
            selected: false,
            applicable: false,
            verdict: None,
        }
    }

    pub fn not_applicable(validator_type: impl Into<String>) -> Self {
        Self {
            validator_type: validator_type.into(),
            selected: true,
            applicable: false,
            verdict: None,
        }
    }

    pub fn judged(validator_type: impl Into<String>, verdict: ValidatorVerdict) -> Self {
        Self {
            validator_type: validator_type.into(),
            selected: true,
            applicable: true,
            verdict: Some(verdict),
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(&self.verdict, Some(v) if !v.valid)
    }
}

/// Full diagnostic report of one guard evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub event_type: EventType,
    pub require_event_validation: bool,
    pub outcomes: Vec<ValidatorOutcome>,
}

impl ValidationReport {
    /// Outcomes of validators that claimed the event.
    pub fn applicable(&self) -> impl Iterator<Item = &ValidatorOutcome> {
        self.outcomes.iter().filter(|o| o.applicable)
    }

    pub fn has_applicable(&self) -> bool {
        self.applicable().next().is_some()
    }

    /// Acceptance policy: every claimant must accept, and at least one must
    /// claim when validation is required.
    pub fn is_valid(&self) -> bool {
        if self.require_event_validation && !self.has_applicable() {
            return false;
        }
        !self.outcomes.iter().any(ValidatorOutcome::is_rejection)
    }

    /// Rejection label, `None` for an accepted event.
    pub fn rejection_reason(&self) -> Option<&'static str> {
        if self.outcomes.iter().any(ValidatorOutcome::is_rejection) {
            Some("validator_rejected")
        } else if self.require_event_validation && !self.has_applicable() {
            Some("no_applicable_validator")
        } else {
            None
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let rejections: Vec<String> = self
            .outcomes
            .iter()
            .filter(|o| o.is_rejection())
            .map(|o| match o.verdict.as_ref().and_then(|v| v.reason.as_deref()) {
                Some(reason) => format!("{}: {}", o.validator_type, reason),
                None => o.validator_type.clone(),
            })
            .collect();

        if !rejections.is_empty() {
            format!("{} rejected by {}", self.event_type, rejections.join(", "))
        } else if !self.is_valid() {
            format!("no validator applies to {}", self.event_type)
        } else {
            format!("{} accepted", self.event_type)
        }
    }
}
