//! Cluster apply with readiness gating.
//!
//! Order of operations:
//! 1. check the secrets manifest exists (before any cluster call)
//! 2. render every templated manifest, registration job included
//! 3. apply the static manifests (namespace, config, secrets, observability)
//! 4. apply the templated workload manifests
//! 5. wait for each primary workload; timeouts are warnings only
//! 6. submit the registration job

use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::RunConfig;
use crate::error::{DeployError, Result};
use crate::kubectl::Kubectl;
use crate::process::ProcessRunner;
use crate::registration::{RegistrationReport, RegistrationTrigger};
use crate::soft::{SoftResult, StepOutcome};
use crate::template::{self, ManifestSet, RenderedManifest};

pub const SECRETS_MANIFEST: &str = "secrets.yaml";

/// Applied as-is, in this order.
pub const STATIC_MANIFESTS: &[&str] = &[
    "namespace.yaml",
    "configmap.yaml",
    SECRETS_MANIFEST,
    "observability.yaml",
];

/// Rendered with the registry reference, then applied in this order.
pub const WORKLOAD_MANIFESTS: &[&str] = &[
    "registry.yaml",
    "exchange.yaml",
    "alerts.yaml",
    "planner.yaml",
    "stopfinder.yaml",
];

/// Label selectors of the primary workloads, in wait order.
const PRIMARY_WORKLOADS: &[&str] = &[
    "app=nanda-registry",
    "app=exchange-agent",
    "app=alerts-agent",
    "app=planner-agent",
];

/// A workload set that should become ready within `timeout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessCriterion {
    pub selector: String,
    pub timeout: Duration,
}

impl ReadinessCriterion {
    pub fn primary(timeout: Duration) -> Vec<Self> {
        PRIMARY_WORKLOADS
            .iter()
            .map(|selector| Self {
                selector: selector.to_string(),
                timeout,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    /// Manifest names in submission order.
    pub submitted: Vec<String>,
    /// Digest over the rendered workload manifests.
    pub manifest_digest: String,
    pub readiness: Vec<StepOutcome>,
    pub registration: RegistrationReport,
}

impl ApplyReport {
    pub fn all_ready(&self) -> bool {
        self.readiness.iter().all(|r| r.result.is_ok())
    }
}

pub struct ClusterApplier<'a> {
    config: &'a RunConfig,
    kubectl: Kubectl<'a>,
}

impl<'a> ClusterApplier<'a> {
    pub fn new(config: &'a RunConfig, runner: &'a dyn ProcessRunner) -> Self {
        Self {
            config,
            kubectl: Kubectl::new(config, runner),
        }
    }

    pub async fn apply(&self) -> Result<ApplyReport> {
        let dir = &self.config.manifests_dir;
        let secrets = dir.join(SECRETS_MANIFEST);
        if !secrets.is_file() {
            return Err(DeployError::MissingSecretsManifest(secrets));
        }

        let registration = RegistrationTrigger::new(self.config, &self.kubectl);
        let workloads = template::render(
            &ManifestSet::in_dir(dir, WORKLOAD_MANIFESTS),
            &self.config.registry,
        )?;
        let registration_job = registration.render()?;
        let manifest_digest = template::set_digest(&workloads);
        info!(
            registry = %self.config.registry,
            digest = %&manifest_digest[..12],
            "Rendered workload manifests"
        );

        let mut submitted = Vec::new();

        for path in ManifestSet::in_dir(dir, STATIC_MANIFESTS).paths() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.submit(&name, path).await?;
            submitted.push(name);
        }

        let workdir = tempfile::Builder::new().prefix("deployctl-").tempdir()?;
        for manifest in &workloads {
            self.submit_rendered(manifest, workdir.path()).await?;
            submitted.push(manifest.name.clone());
        }

        let mut readiness = Vec::new();
        for criterion in ReadinessCriterion::primary(self.config.readiness_timeout) {
            readiness.push(self.wait_ready(&criterion).await);
        }

        let registration = registration.register(&registration_job, workdir.path()).await?;
        submitted.push(registration_job.name.clone());

        Ok(ApplyReport {
            submitted,
            manifest_digest,
            readiness,
            registration,
        })
    }

    async fn submit(&self, name: &str, path: &Path) -> Result<()> {
        info!(manifest = %name, "Applying manifest");
        let output = self.kubectl.run(&self.kubectl.apply_command(path)).await?;
        if output.success() {
            Ok(())
        } else {
            Err(DeployError::Apply {
                manifest: name.to_string(),
                reason: output.failure_reason(),
            })
        }
    }

    async fn submit_rendered(&self, manifest: &RenderedManifest, workdir: &Path) -> Result<()> {
        let path = workdir.join(&manifest.name);
        tokio::fs::write(&path, &manifest.content).await?;
        self.submit(&manifest.name, &path).await
    }

    async fn wait_ready(&self, criterion: &ReadinessCriterion) -> StepOutcome {
        info!(
            selector = %criterion.selector,
            timeout_secs = criterion.timeout.as_secs(),
            "Waiting for workload readiness"
        );
        let command = self
            .kubectl
            .wait_ready_command(&criterion.selector, criterion.timeout);
        let result = match self.kubectl.run(&command).await {
            Ok(output) => SoftResult::from_output(&output),
            Err(e) => SoftResult::failure(e.to_string()),
        };
        StepOutcome::new(format!("readiness {}", criterion.selector), result)
    }
}
