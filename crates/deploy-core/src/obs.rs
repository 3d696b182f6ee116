//! Structured observability hooks for deployment runs.
//!
//! - Run-scoped tracing span via [`run_span`]
//! - Emission functions for phase start/finish and soft failures
//!
//! Phase events are emitted at `info!`, soft failures at `warn!`.

use tracing::{info, warn};

/// Span tagging every event of one run with its id and phase.
///
/// Attach it to the run future with `tracing::Instrument` rather than
/// entering it, so it is never held across an `.await`.
pub fn run_span(run_id: &str, phase: &str) -> tracing::Span {
    tracing::info_span!("deployctl.run", run_id = %run_id, phase = %phase)
}

/// Emit event: a phase started.
pub fn emit_phase_started(phase: &str) {
    info!(event = "phase.started", phase = %phase);
}

/// Emit event: a phase finished with duration and outcome.
pub fn emit_phase_finished(phase: &str, duration_ms: u64, success: bool) {
    info!(
        event = "phase.finished",
        phase = %phase,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: a non-fatal step failed and the run continues.
pub fn emit_soft_failure(step: &str, reason: &str) {
    warn!(event = "step.soft_failure", step = %step, reason = %reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_emit_soft_failure_logs_step() {
        emit_soft_failure("docker rmi mbta-agent", "No such image");
        assert!(logs_contain("step.soft_failure"));
        assert!(logs_contain("docker rmi mbta-agent"));
    }

    #[traced_test]
    #[test]
    fn test_run_span_carries_run_id() {
        let span = run_span("run-123", "build");
        span.in_scope(|| emit_phase_started("build"));
        assert!(logs_contain("run-123"));
    }
}
