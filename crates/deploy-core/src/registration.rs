//! Discovery registration job.
//!
//! After the workloads are applied, a one-shot Job announces each agent to
//! the discovery registry. The orchestrator only waits for the Job to be
//! accepted by the cluster, not for it to finish.

use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::config::RunConfig;
use crate::error::{DeployError, Result};
use crate::kubectl::Kubectl;
use crate::soft::{SoftResult, StepOutcome};
use crate::template::{ManifestTemplate, RenderedManifest};

pub const REGISTRATION_TEMPLATE: &str = "register-agents-job.yaml";
pub const REGISTRATION_JOB: &str = "register-agents";

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationReport {
    pub job: String,
    pub manifest_digest: String,
    /// Removal of the previous run's job.
    pub cleanup: StepOutcome,
}

pub struct RegistrationTrigger<'a> {
    config: &'a RunConfig,
    kubectl: &'a Kubectl<'a>,
}

impl<'a> RegistrationTrigger<'a> {
    pub fn new(config: &'a RunConfig, kubectl: &'a Kubectl<'a>) -> Self {
        Self { config, kubectl }
    }

    /// Render the job manifest without touching the cluster.
    pub fn render(&self) -> Result<RenderedManifest> {
        let template = ManifestTemplate::load(&self.config.manifests_dir.join(REGISTRATION_TEMPLATE))?;
        Ok(template.render(&self.config.registry))
    }

    /// Write the rendered job to `workdir` and submit it.
    ///
    /// Jobs are immutable, so a job left by an earlier run is deleted first.
    pub async fn register(&self, manifest: &RenderedManifest, workdir: &Path) -> Result<RegistrationReport> {
        let delete = self.kubectl.delete_job_command(REGISTRATION_JOB);
        let cleanup = StepOutcome::new(
            delete.to_string(),
            match self.kubectl.run(&delete).await {
                Ok(output) => SoftResult::from_output(&output),
                Err(e) => SoftResult::failure(e.to_string()),
            },
        );

        let path = workdir.join(&manifest.name);
        tokio::fs::write(&path, &manifest.content).await?;

        let apply = self.kubectl.apply_command(&path);
        let output = self.kubectl.run(&apply).await?;
        if !output.success() {
            return Err(DeployError::Apply {
                manifest: manifest.name.clone(),
                reason: output.failure_reason(),
            });
        }

        info!(job = REGISTRATION_JOB, "Registration job submitted");
        Ok(RegistrationReport {
            job: REGISTRATION_JOB.to_string(),
            manifest_digest: manifest.digest.clone(),
            cleanup,
        })
    }
}
