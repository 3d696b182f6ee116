//! Phase dispatch.
//!
//! Each phase is a function over the shared [`RunConfig`]. `All` is the
//! composition Build → Push → Apply; it has no code path of its own.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::apply::{ApplyReport, ClusterApplier};
use crate::config::RunConfig;
use crate::credentials::CredentialResolver;
use crate::error::Result;
use crate::image::{BuildReport, ImageBuilder, PushReport};
use crate::obs::{emit_phase_finished, emit_phase_started, run_span};
use crate::process::ProcessRunner;
use crate::soft::StepOutcome;
use crate::teardown::{RegistryApi, TeardownController, TeardownReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Build,
    Push,
    Apply,
    Destroy,
    All,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Build => "build",
            Phase::Push => "push",
            Phase::Apply => "apply",
            Phase::Destroy => "destroy",
            Phase::All => "all",
        }
    }

    /// The steps this phase runs, in order.
    pub fn steps(&self) -> &'static [Step] {
        match self {
            Phase::Build => &[Step::Build],
            Phase::Push => &[Step::Push],
            Phase::Apply => &[Step::Apply],
            Phase::Destroy => &[Step::Destroy],
            Phase::All => &[Step::Build, Step::Push, Step::Apply],
        }
    }
}

/// A single primitive phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Build,
    Push,
    Apply,
    Destroy,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Build => "build",
            Step::Push => "push",
            Step::Apply => "apply",
            Step::Destroy => "destroy",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Record of one invocation. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub phase: Phase,
    pub registry: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub build: Option<BuildReport>,
    pub push: Option<PushReport>,
    pub apply: Option<ApplyReport>,
    pub teardown: Option<TeardownReport>,
}

impl RunReport {
    /// Every non-fatal failure recorded by the phases that ran.
    pub fn soft_failures(&self) -> Vec<&StepOutcome> {
        let mut failures = Vec::new();
        if let Some(apply) = &self.apply {
            failures.extend(apply.readiness.iter().filter(|o| !o.result.is_ok()));
            if !apply.registration.cleanup.result.is_ok() {
                failures.push(&apply.registration.cleanup);
            }
        }
        if let Some(teardown) = &self.teardown {
            failures.extend(teardown.soft_failures());
        }
        failures
    }
}

pub struct Orchestrator<'a> {
    config: &'a RunConfig,
    runner: &'a dyn ProcessRunner,
    registry_api: &'a dyn RegistryApi,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a RunConfig,
        runner: &'a dyn ProcessRunner,
        registry_api: &'a dyn RegistryApi,
    ) -> Self {
        Self {
            config,
            runner,
            registry_api,
        }
    }

    /// Run `phase` to completion, stopping at the first fatal error.
    pub async fn run(&self, phase: Phase) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = run_span(&run_id.to_string(), phase.name());
        self.run_phase(run_id, phase).instrument(span).await
    }

    async fn run_phase(&self, run_id: Uuid, phase: Phase) -> Result<RunReport> {
        info!(registry = %self.config.registry, "Starting deployment run");

        let mut report = RunReport {
            run_id,
            phase,
            registry: self.config.registry.to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            build: None,
            push: None,
            apply: None,
            teardown: None,
        };

        for step in phase.steps() {
            let start = Instant::now();
            emit_phase_started(step.name());
            let outcome = self.run_step(*step, &mut report).await;
            emit_phase_finished(step.name(), start.elapsed().as_millis() as u64, outcome.is_ok());
            outcome?;
        }

        report.finished_at = Utc::now();
        Ok(report)
    }

    async fn run_step(&self, step: Step, report: &mut RunReport) -> Result<()> {
        match step {
            Step::Build => {
                report.build = Some(ImageBuilder::new(self.config, self.runner).build().await?);
            }
            Step::Push => {
                report.push = Some(ImageBuilder::new(self.config, self.runner).push().await?);
            }
            Step::Apply => {
                report.apply = Some(ClusterApplier::new(self.config, self.runner).apply().await?);
            }
            Step::Destroy => {
                let credentials = CredentialResolver::new(self.config).resolve();
                let controller = TeardownController::new(self.config, self.runner, self.registry_api);
                report.teardown = Some(controller.destroy(credentials.as_ref()).await);
            }
        }
        Ok(())
    }
}
