//! Verification of wait outcomes.
//!
//! Verification never fails loudly: every check produces a [`Verification`]
//! value, and [`TestLog`] collects them so a run continues past failures.

use crate::events::WaitOutcome;
use serde::Serialize;
use stepwatch_sdk::ids::{CorrelationToken, RequestId, TypeName};
use thiserror::Error;
use tracing::{error, info};

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum VerificationFailure {
    /// The wait timed out or was cancelled.
    #[error("no event received ({outcome})")]
    NoEventReceived { outcome: &'static str },

    /// More than one request fired while exactly one was required.
    #[error("ambiguous match between {} requests", requests.len())]
    AmbiguousMatch { requests: Vec<RequestId> },

    /// A different request fired.
    #[error("request {actual} (token {token}) fired, expected {expected}")]
    WrongRequestFired {
        expected: RequestId,
        actual: RequestId,
        token: CorrelationToken,
    },

    /// The right request fired, in the wrong type.
    #[error("unexpected declaring type {actual}, expected {expected}")]
    WrongDeclaringEntity { expected: TypeName, actual: TypeName },

    /// Anything else the run wants on record, e.g. a worker join failure.
    #[error("{reason}")]
    Other { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum Verification {
    Pass,
    Fail(VerificationFailure),
}

impl Verification {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verification::Pass)
    }
}

/// Check that `outcome` is a match of `expected_request` in
/// `expected_declaring_type`.
pub fn verify(
    outcome: &WaitOutcome,
    expected_request: RequestId,
    expected_declaring_type: &TypeName,
) -> Verification {
    let matched = match outcome {
        WaitOutcome::Matched(matched) => matched,
        WaitOutcome::Ambiguous { requests } => {
            return Verification::Fail(VerificationFailure::AmbiguousMatch {
                requests: requests.to_vec(),
            });
        }
        other => {
            return Verification::Fail(VerificationFailure::NoEventReceived {
                outcome: other.label(),
            });
        }
    };

    if matched.request_id != expected_request {
        return Verification::Fail(VerificationFailure::WrongRequestFired {
            expected: expected_request,
            actual: matched.request_id,
            token: matched.token.clone(),
        });
    }

    if &matched.event.declaring_type != expected_declaring_type {
        return Verification::Fail(VerificationFailure::WrongDeclaringEntity {
            expected: expected_declaring_type.clone(),
            actual: matched.event.declaring_type.clone(),
        });
    }

    Verification::Pass
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: String,
    pub verification: Verification,
}

/// Ordered record of every verified step.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestLog {
    steps: Vec<StepRecord>,
}

impl TestLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verification and return whether it passed.
    pub fn record(&mut self, step: impl Into<String>, verification: Verification) -> bool {
        let step = step.into();
        match &verification {
            Verification::Pass => info!(%step, "Step passed"),
            Verification::Fail(failure) => error!(%step, %failure, "Step failed"),
        }
        let passed = verification.is_pass();
        self.steps.push(StepRecord { step, verification });
        passed
    }

    /// Record a failure that did not come from [`verify`].
    pub fn fail(&mut self, step: impl Into<String>, reason: impl Into<String>) {
        self.record(
            step,
            Verification::Fail(VerificationFailure::Other {
                reason: reason.into(),
            }),
        );
    }

    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.verification.is_pass())
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &VerificationFailure)> {
        self.steps.iter().filter_map(|s| match &s.verification {
            Verification::Fail(failure) => Some((s.step.as_str(), failure)),
            Verification::Pass => None,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
