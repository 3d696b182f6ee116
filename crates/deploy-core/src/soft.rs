//! Outcome type for best-effort steps.
//!
//! A `SoftResult` never aborts a run. Failures are logged through
//! [`SoftResult::log`] so they show up uniformly instead of being dropped.

use serde::Serialize;

use crate::obs::emit_soft_failure;
use crate::process::CommandOutput;

/// Outcome of a non-fatal step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum SoftResult {
    Ok,
    SoftFailure(String),
}

impl SoftResult {
    pub fn failure(reason: impl Into<String>) -> Self {
        SoftResult::SoftFailure(reason.into())
    }

    /// Classify a finished command by exit status.
    pub fn from_output(output: &CommandOutput) -> Self {
        if output.success() {
            SoftResult::Ok
        } else {
            SoftResult::SoftFailure(output.failure_reason())
        }
    }

    /// Fold any error into a soft failure.
    pub fn from_result<T, E: std::fmt::Display>(result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(_) => SoftResult::Ok,
            Err(e) => SoftResult::SoftFailure(e.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, SoftResult::Ok)
    }

    /// Log a failure as a warning tagged with `step`, then return self.
    pub fn log(self, step: &str) -> Self {
        if let SoftResult::SoftFailure(reason) = &self {
            emit_soft_failure(step, reason);
        }
        self
    }
}

/// A soft outcome tagged with the step that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: String,
    pub result: SoftResult,
}

impl StepOutcome {
    pub fn new(step: impl Into<String>, result: SoftResult) -> Self {
        let step = step.into();
        let result = result.log(&step);
        Self { step, result }
    }
}
