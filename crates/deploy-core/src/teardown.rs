//! Teardown.
//!
//! Only the namespace deletion attempt matters for the outcome. Local image
//! removal, builder removal and remote tag deletion are best-effort and
//! end up as [`StepOutcome`]s in the report.

use async_trait::async_trait;
use hub_client::{BasicAuth, HubClient, HubConfig, HubError};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::credentials::Credentials;
use crate::kubectl::Kubectl;
use crate::process::{CommandSpec, ProcessRunner};
use crate::soft::{SoftResult, StepOutcome};

/// Remote registry tag management.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    async fn delete_tag(
        &self,
        auth: &BasicAuth,
        namespace: &str,
        repository: &str,
        tag: &str,
    ) -> Result<(), HubError>;
}

#[async_trait]
impl RegistryApi for HubClient {
    async fn delete_tag(
        &self,
        auth: &BasicAuth,
        namespace: &str,
        repository: &str,
        tag: &str,
    ) -> Result<(), HubError> {
        HubClient::delete_tag(self, auth, namespace, repository, tag).await
    }
}

/// Client for the configured registry management API.
pub fn registry_client(config: &RunConfig) -> Result<HubClient, HubError> {
    HubClient::new(HubConfig::new(&config.hub_api_url))
}

/// Why remote cleanup did or did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteCleanup {
    /// Registry is not the default public registry.
    NotApplicable,
    /// No credentials; one skipped entry per image.
    SkippedNoCredentials { images: Vec<String> },
    /// Delete calls were issued.
    Attempted { outcomes: Vec<StepOutcome> },
}

#[derive(Debug, Clone, Serialize)]
pub struct TeardownReport {
    pub namespace: StepOutcome,
    pub local_images: Vec<StepOutcome>,
    pub builder: StepOutcome,
    pub remote: RemoteCleanup,
}

impl TeardownReport {
    /// Every soft failure collected during teardown.
    pub fn soft_failures(&self) -> Vec<&StepOutcome> {
        let mut all = vec![&self.namespace];
        all.extend(&self.local_images);
        all.push(&self.builder);
        if let RemoteCleanup::Attempted { outcomes } = &self.remote {
            all.extend(outcomes);
        }
        all.into_iter().filter(|o| !o.result.is_ok()).collect()
    }
}

pub struct TeardownController<'a> {
    config: &'a RunConfig,
    runner: &'a dyn ProcessRunner,
    registry_api: &'a dyn RegistryApi,
}

impl<'a> TeardownController<'a> {
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

    /// Tear everything down. Never fails once the namespace deletion was attempted.
    pub async fn destroy(&self, credentials: Option<&Credentials>) -> TeardownReport {
        let kubectl = Kubectl::new(self.config, self.runner);

        info!(namespace = %self.config.namespace, "Deleting namespace");
        let namespace = self.soft_run(&kubectl.delete_namespace_command()).await;

        let mut local_images = Vec::with_capacity(self.config.images.len());
        for spec in &self.config.images {
            let image_ref = spec.image_ref(&self.config.registry);
            let rmi = CommandSpec::new("docker").args(["rmi", "-f"]).arg(image_ref);
            local_images.push(self.soft_run(&rmi).await);
        }

        let rm_builder = CommandSpec::new("docker")
            .args(["buildx", "rm"])
            .arg(&self.config.builder_name);
        let builder = self.soft_run(&rm_builder).await;

        let remote = self.remote_cleanup(credentials).await;

        TeardownReport {
            namespace,
            local_images,
            builder,
            remote,
        }
    }

    async fn soft_run(&self, command: &CommandSpec) -> StepOutcome {
        let result = match self.runner.run(command).await {
            Ok(output) => SoftResult::from_output(&output),
            Err(e) => SoftResult::failure(e.to_string()),
        };
        StepOutcome::new(command.to_string(), result)
    }

    async fn remote_cleanup(&self, credentials: Option<&Credentials>) -> RemoteCleanup {
        let registry = &self.config.registry;
        if !registry.is_default_public() {
            info!(registry = %registry.reference(), "Registry is not the public registry; leaving remote tags");
            return RemoteCleanup::NotApplicable;
        }

        let Some(credentials) = credentials else {
            let mut images = Vec::with_capacity(self.config.images.len());
            for spec in &self.config.images {
                let image_ref = spec.image_ref(registry);
                warn!(image = %image_ref, "No registry credentials; skipping remote tag deletion");
                images.push(image_ref);
            }
            return RemoteCleanup::SkippedNoCredentials { images };
        };

        let auth = BasicAuth::from(credentials);
        let mut outcomes = Vec::with_capacity(self.config.images.len());
        for spec in &self.config.images {
            let result = self
                .registry_api
                .delete_tag(&auth, registry.namespace(), &spec.name, &spec.tag)
                .await;
            outcomes.push(StepOutcome::new(
                format!("delete remote tag {}", spec.image_ref(registry)),
                SoftResult::from_result(result),
            ));
        }
        RemoteCleanup::Attempted { outcomes }
    }
}
