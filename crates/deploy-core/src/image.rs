//! Container image builds and pushes.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{BuildMode, RegistryReference, RunConfig};
use crate::error::{DeployError, Result};
use crate::process::{CommandSpec, ProcessRunner};

/// Name and build context directory of every image the stack needs.
const IMAGES: &[(&str, &str)] = &[
    ("mbta-exchange", "src/exchange_agent"),
    ("mbta-agent", "src/agents"),
    ("mbta-registry", "src/registry"),
];

/// One buildable image. Identity is `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSpec {
    pub name: String,
    pub context: PathBuf,
    pub dockerfile: PathBuf,
    pub platforms: Vec<String>,
    pub tag: String,
}

impl ImageSpec {
    pub fn new(name: &str, context: PathBuf, platforms: &[String], tag: &str) -> Self {
        let dockerfile = context.join("Dockerfile");
        Self {
            name: name.to_string(),
            context,
            dockerfile,
            platforms: platforms.to_vec(),
            tag: tag.to_string(),
        }
    }

    /// Fully qualified tag under `registry`: `<reference>/<name>:<tag>`.
    pub fn image_ref(&self, registry: &RegistryReference) -> String {
        format!("{}/{}:{}", registry.reference(), self.name, self.tag)
    }

    /// The three images of the stack, contexts relative to `root`.
    pub fn defaults(root: &Path, platforms: &[String], tag: &str) -> Vec<Self> {
        IMAGES
            .iter()
            .map(|(name, context)| Self::new(name, root.join(context), platforms, tag))
            .collect()
    }
}

/// What a build phase did.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub mode: BuildMode,
    /// Fully qualified tags, in build order.
    pub images: Vec<String>,
    /// Whether the images were pushed as part of the build.
    pub pushed: bool,
}

/// What a push phase did.
#[derive(Debug, Clone, Serialize)]
pub struct PushReport {
    pub pushed: Vec<String>,
    /// True when the build already pushed and this phase did nothing.
    pub skipped: bool,
}

/// Drives `docker build` / `docker buildx build` / `docker push`.
pub struct ImageBuilder<'a> {
    config: &'a RunConfig,
    runner: &'a dyn ProcessRunner,
}

impl<'a> ImageBuilder<'a> {
    pub fn new(config: &'a RunConfig, runner: &'a dyn ProcessRunner) -> Self {
        Self { config, runner }
    }

    /// Build every image, stopping at the first failure.
    ///
    /// In multi-arch mode images are always pushed by the build itself,
    /// because a multi-platform result cannot be loaded into the local
    /// image store.
    pub async fn build(&self) -> Result<BuildReport> {
        let mode = self.config.build_mode();
        let pushed = matches!(mode, BuildMode::MultiArch { .. });

        if let BuildMode::MultiArch { platforms } = &mode {
            info!(platforms = %platforms.join(","), "Multi-arch build (build-and-push)");
            self.ensure_builder().await?;
        } else {
            info!("Single-architecture local build");
        }

        let mut images = Vec::with_capacity(self.config.images.len());
        for spec in &self.config.images {
            let image_ref = spec.image_ref(&self.config.registry);
            if !spec.context.is_dir() {
                return Err(DeployError::Build {
                    image: spec.name.clone(),
                    reason: format!("build context {} does not exist", spec.context.display()),
                });
            }

            info!(image = %image_ref, "Building image");
            let command = match &mode {
                BuildMode::MultiArch { .. } => buildx_command(spec, &image_ref),
                BuildMode::Local => build_command(spec, &image_ref),
            };
            self.run_build_step(&spec.name, &command).await?;
            images.push(image_ref);
        }

        Ok(BuildReport {
            mode,
            images,
            pushed,
        })
    }

    /// Push every image built locally.
    ///
    /// A no-op in multi-arch mode, where the build has already pushed.
    pub async fn push(&self) -> Result<PushReport> {
        if let BuildMode::MultiArch { .. } = self.config.build_mode() {
            info!("Images were pushed during the multi-arch build; nothing to push");
            return Ok(PushReport {
                pushed: Vec::new(),
                skipped: true,
            });
        }

        let mut pushed = Vec::with_capacity(self.config.images.len());
        for spec in &self.config.images {
            let image_ref = spec.image_ref(&self.config.registry);
            info!(image = %image_ref, "Pushing image");
            let command = CommandSpec::new("docker").arg("push").arg(&image_ref);
            self.run_build_step(&spec.name, &command).await?;
            pushed.push(image_ref);
        }

        Ok(PushReport {
            pushed,
            skipped: false,
        })
    }

    /// Select the multi-arch builder, creating it when missing.
    async fn ensure_builder(&self) -> Result<()> {
        let name = &self.config.builder_name;
        let inspect = CommandSpec::new("docker")
            .args(["buildx", "inspect"])
            .arg(name);
        let use_existing = CommandSpec::new("docker").args(["buildx", "use"]).arg(name);

        if self.runner.run(&inspect).await?.success() {
            info!(builder = %name, "Reusing buildx builder");
            return self.run_build_step(name, &use_existing).await;
        }

        let create = CommandSpec::new("docker")
            .args(["buildx", "create", "--name"])
            .arg(name)
            .args(["--driver", "docker-container", "--use"]);
        let output = self.runner.run(&create).await?;
        if output.success() {
            info!(builder = %name, "Created buildx builder");
            return Ok(());
        }

        // Lost a race with another creator, or inspect failed for another reason.
        if output.stderr.contains("existing instance") || output.stderr.contains("already exists") {
            warn!(builder = %name, "Builder already exists; selecting it");
            return self.run_build_step(name, &use_existing).await;
        }

        Err(DeployError::Build {
            image: name.clone(),
            reason: format!("cannot create buildx builder: {}", output.failure_reason()),
        })
    }

    async fn run_build_step(&self, image: &str, command: &CommandSpec) -> Result<()> {
        let output = self.runner.run(command).await?;
        if output.success() {
            Ok(())
        } else {
            Err(DeployError::Build {
                image: image.to_string(),
                reason: format!("`{}` failed with {}", command, output.failure_reason()),
            })
        }
    }
}

fn build_command(spec: &ImageSpec, image_ref: &str) -> CommandSpec {
    CommandSpec::new("docker")
        .arg("build")
        .args(["-t", image_ref])
        .arg("-f")
        .arg(spec.dockerfile.to_string_lossy())
        .arg(spec.context.to_string_lossy())
}

fn buildx_command(spec: &ImageSpec, image_ref: &str) -> CommandSpec {
    CommandSpec::new("docker")
        .args(["buildx", "build", "--platform"])
        .arg(spec.platforms.join(","))
        .args(["-t", image_ref])
        .arg("-f")
        .arg(spec.dockerfile.to_string_lossy())
        .arg("--push")
        .arg(spec.context.to_string_lossy())
}
