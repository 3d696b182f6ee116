//! Manifest templating.
//!
//! Binds the registry reference into manifest templates by plain token
//! substitution. Rendering is all-or-nothing: every template is read before
//! any output is produced.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::RegistryReference;
use crate::error::{DeployError, Result};

/// Replaced by the registry reference (`host/namespace`).
pub const REGISTRY_TOKEN: &str = "${DOCKER_REGISTRY}";
/// Replaced by the image tag.
pub const TAG_TOKEN: &str = "${IMAGE_TAG}";

/// A manifest template as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestTemplate {
    pub path: PathBuf,
    pub content: String,
}

impl ManifestTemplate {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| DeployError::Template {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            content,
        })
    }

    /// File name used for logging and for the rendered copy.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Substitute both tokens; nothing else is touched.
    pub fn render(&self, registry: &RegistryReference) -> RenderedManifest {
        let content = self
            .content
            .replace(REGISTRY_TOKEN, registry.reference())
            .replace(TAG_TOKEN, registry.tag());
        RenderedManifest::new(self.file_name(), self.path.clone(), content)
    }
}

/// Concrete manifest ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedManifest {
    pub name: String,
    pub source: PathBuf,
    #[serde(skip)]
    pub content: String,
    /// SHA-256 hex of `content`.
    pub digest: String,
}

impl RenderedManifest {
    fn new(name: String, source: PathBuf, content: String) -> Self {
        let digest = hex::encode(Sha256::digest(content.as_bytes()));
        Self {
            name,
            source,
            content,
            digest,
        }
    }
}

/// Ordered manifest template paths; order is submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSet {
    paths: Vec<PathBuf>,
}

impl ManifestSet {
    /// `names` resolved against `dir`, keeping their order.
    pub fn in_dir(dir: &Path, names: &[&str]) -> Self {
        Self {
            paths: names.iter().map(|n| dir.join(n)).collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Read every template in `set`, then render all of them.
pub fn render(set: &ManifestSet, registry: &RegistryReference) -> Result<Vec<RenderedManifest>> {
    let templates = set
        .paths()
        .iter()
        .map(|p| ManifestTemplate::load(p))
        .collect::<Result<Vec<_>>>()?;

    let rendered: Vec<RenderedManifest> = templates.iter().map(|t| t.render(registry)).collect();
    for manifest in &rendered {
        debug!(manifest = %manifest.name, digest = %&manifest.digest[..12], "Rendered manifest");
    }
    Ok(rendered)
}

/// Combined digest of an ordered list of rendered manifests.
pub fn set_digest(manifests: &[RenderedManifest]) -> String {
    let mut hasher = Sha256::new();
    for manifest in manifests {
        hasher.update(manifest.name.as_bytes());
        hasher.update(b"\0");
        hasher.update(manifest.digest.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}
