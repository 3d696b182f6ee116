//! Error taxonomy for the deployment orchestrator.
//!
//! Every variant here is fatal for the phase that produced it. Non-fatal
//! outcomes (readiness timeouts, teardown cleanup failures) are modelled as
//! [`crate::soft::SoftResult`] instead and never reach this type.

use std::path::PathBuf;

/// Fatal deployment errors.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("required secrets manifest not found: {}", .0.display())]
    MissingSecretsManifest(PathBuf),

    #[error("cannot read manifest template {}: {source}", .path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image build failed for {image}: {reason}")]
    Build { image: String, reason: String },

    #[error("manifest submission failed for {manifest}: {reason}")]
    Apply { manifest: String, reason: String },

    #[error("failed to run {program}: {reason}")]
    Process { program: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    /// Whether this error was raised before any external side effect.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DeployError::Config(_) | DeployError::MissingSecretsManifest(_)
        )
    }
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = DeployError::Config("DOCKER_REGISTRY is not set".to_string());
        assert!(err.to_string().contains("configuration error"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_missing_secrets_is_configuration() {
        let err = DeployError::MissingSecretsManifest(PathBuf::from("k8s/secrets.yaml"));
        assert!(err.to_string().contains("k8s/secrets.yaml"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_build_error_not_configuration() {
        let err = DeployError::Build {
            image: "mbta-agent".to_string(),
            reason: "exit code 1".to_string(),
        };
        assert!(err.to_string().contains("mbta-agent"));
        assert!(!err.is_configuration());
    }
}
