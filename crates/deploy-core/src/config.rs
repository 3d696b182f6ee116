//! Run configuration.
//!
//! Raw key/value settings are collected once at program entry into
//! [`Settings`], then resolved into an immutable [`RunConfig`] that every
//! component receives by reference. Nothing below this module reads the
//! process environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DeployError, Result};
use crate::image::ImageSpec;

pub const DEFAULT_TAG: &str = "latest";
pub const DEFAULT_PLATFORMS: &str = "linux/amd64,linux/arm64";
pub const DEFAULT_NAMESPACE: &str = "mbta";
pub const DEFAULT_MANIFESTS_DIR: &str = "k8s";
pub const DEFAULT_KUBECONFIG_PATH: &str = "terraform/kubeconfig";
pub const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 300;
pub const BUILDER_NAME: &str = "mbta-builder";

/// Hosts that address the default public registry.
const PUBLIC_REGISTRY_HOSTS: &[&str] = &["docker.io", "index.docker.io", "registry-1.docker.io"];

/// Unresolved settings, one field per configuration key.
///
/// Empty strings are treated as unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub registry: Option<String>,
    pub image_tag: Option<String>,
    pub use_buildx: Option<String>,
    pub platforms: Option<String>,
    pub docker_username: Option<String>,
    pub docker_password: Option<String>,
    pub docker_config_dir: Option<String>,
    pub home_dir: Option<String>,
    pub namespace: Option<String>,
    pub project_root: Option<String>,
    pub manifests_dir: Option<String>,
    pub kubeconfig_path: Option<String>,
    pub readiness_timeout_secs: Option<String>,
    pub hub_api_url: Option<String>,
    pub command_timeout_secs: Option<String>,
}

impl Settings {
    /// Collect settings through a key lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Settings {
            registry: get("DOCKER_REGISTRY"),
            image_tag: get("IMAGE_TAG"),
            use_buildx: get("USE_BUILDX"),
            platforms: get("PLATFORMS"),
            docker_username: get("DOCKER_USERNAME"),
            docker_password: get("DOCKER_PASSWORD"),
            docker_config_dir: get("DOCKER_CONFIG"),
            home_dir: get("HOME"),
            namespace: get("K8S_NAMESPACE"),
            project_root: get("DEPLOYCTL_ROOT"),
            manifests_dir: get("MANIFESTS_DIR"),
            kubeconfig_path: get("KUBECONFIG_PATH"),
            readiness_timeout_secs: get("READINESS_TIMEOUT_SECS"),
            hub_api_url: get("DOCKER_HUB_API"),
            command_timeout_secs: get("DEPLOYCTL_COMMAND_TIMEOUT_SECS"),
        }
    }

    /// Collect settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Where built images are pushed to and pulled from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryReference {
    reference: String,
    tag: String,
}

impl RegistryReference {
    pub fn new(reference: &str, tag: &str) -> Result<Self> {
        let reference = reference.trim().trim_end_matches('/');
        if reference.is_empty() {
            return Err(DeployError::Config(
                "DOCKER_REGISTRY is not set; refusing to run".to_string(),
            ));
        }
        let tag = tag.trim();
        if tag.is_empty() || tag.contains(['/', ':', ' ']) {
            return Err(DeployError::Config(format!("invalid image tag '{}'", tag)));
        }
        Ok(Self {
            reference: reference.to_string(),
            tag: tag.to_string(),
        })
    }

    /// The host/namespace string, e.g. `docker.io/myorg`.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Leading segment when it names a registry host, with or without a path after it.
    fn host(&self) -> Option<&str> {
        let first = self.reference.split('/').next()?;
        (first.contains('.') || first.contains(':') || first == "localhost").then_some(first)
    }

    /// Whether images land on the default public registry.
    pub fn is_default_public(&self) -> bool {
        match self.host() {
            None => true,
            Some(host) => PUBLIC_REGISTRY_HOSTS.contains(&host),
        }
    }

    /// Account namespace used by the registry management API.
    pub fn namespace(&self) -> &str {
        self.reference
            .rsplit('/')
            .next()
            .unwrap_or(&self.reference)
    }
}

impl std::fmt::Display for RegistryReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.reference, self.tag)
    }
}

/// How images are built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    /// `docker buildx build --platform ... --push`; push is part of the build.
    MultiArch { platforms: Vec<String> },
    /// `docker build`, followed by a separate `docker push`.
    Local,
}

/// Immutable configuration for one invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub registry: RegistryReference,
    pub multi_arch: bool,
    pub platforms: Vec<String>,
    pub explicit_username: Option<String>,
    pub explicit_secret: Option<String>,
    pub credential_store: Option<PathBuf>,
    pub namespace: String,
    pub project_root: PathBuf,
    pub manifests_dir: PathBuf,
    pub kubeconfig: Option<PathBuf>,
    pub readiness_timeout: Duration,
    pub hub_api_url: String,
    pub command_timeout: Option<Duration>,
    pub builder_name: String,
    pub images: Vec<ImageSpec>,
}

impl RunConfig {
    /// Validate settings and build the run configuration.
    ///
    /// Fails when the registry reference is missing, before anything else
    /// has a chance to run.
    pub fn resolve(settings: Settings) -> Result<Self> {
        let tag = settings.image_tag.as_deref().unwrap_or(DEFAULT_TAG);
        let registry = RegistryReference::new(settings.registry.as_deref().unwrap_or(""), tag)?;

        let multi_arch = match settings.use_buildx.as_deref() {
            Some(raw) => parse_bool("USE_BUILDX", raw)?,
            None => true,
        };

        let platforms = parse_platforms(settings.platforms.as_deref().unwrap_or(DEFAULT_PLATFORMS))?;

        let credential_store = settings
            .docker_config_dir
            .as_deref()
            .map(PathBuf::from)
            .or_else(|| settings.home_dir.as_deref().map(|h| Path::new(h).join(".docker")))
            .map(|dir| dir.join("config.json"));

        let project_root = PathBuf::from(settings.project_root.as_deref().unwrap_or("."));

        let manifests_dir = resolve_path(
            &project_root,
            settings.manifests_dir.as_deref().unwrap_or(DEFAULT_MANIFESTS_DIR),
        );

        // The generated cluster-access file is optional.
        let kubeconfig = Some(resolve_path(
            &project_root,
            settings
                .kubeconfig_path
                .as_deref()
                .unwrap_or(DEFAULT_KUBECONFIG_PATH),
        ))
        .filter(|p| p.is_file());

        let readiness_timeout = Duration::from_secs(match settings.readiness_timeout_secs.as_deref() {
            Some(raw) => parse_secs("READINESS_TIMEOUT_SECS", raw)?,
            None => DEFAULT_READINESS_TIMEOUT_SECS,
        });

        let command_timeout = settings
            .command_timeout_secs
            .as_deref()
            .map(|raw| parse_secs("DEPLOYCTL_COMMAND_TIMEOUT_SECS", raw))
            .transpose()?
            .map(Duration::from_secs);

        let images = ImageSpec::defaults(&project_root, &platforms, registry.tag());

        Ok(RunConfig {
            registry,
            multi_arch,
            platforms,
            explicit_username: settings.docker_username,
            explicit_secret: settings.docker_password,
            credential_store,
            namespace: settings
                .namespace
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            project_root,
            manifests_dir,
            kubeconfig,
            readiness_timeout,
            hub_api_url: settings
                .hub_api_url
                .unwrap_or_else(|| hub_client::DEFAULT_API_URL.to_string()),
            command_timeout,
            builder_name: BUILDER_NAME.to_string(),
            images,
        })
    }

    /// Multi-arch only applies when enabled and more than one platform is named.
    pub fn build_mode(&self) -> BuildMode {
        if self.multi_arch && self.platforms.len() > 1 {
            BuildMode::MultiArch {
                platforms: self.platforms.clone(),
            }
        } else {
            BuildMode::Local
        }
    }
}

fn resolve_path(root: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DeployError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| DeployError::Config(format!("{} must be a whole number of seconds, got '{}'", key, raw)))
}

fn parse_platforms(raw: &str) -> Result<Vec<String>> {
    let platforms: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if platforms.is_empty() {
        return Err(DeployError::Config("PLATFORMS names no platform".to_string()));
    }
    Ok(platforms)
}
