//! Registry management API client
//!
//! Deletes image tags from a Docker Hub compatible management API.
//! Only tag deletion is needed: deployctl uses it for best-effort remote
//! cleanup during teardown.

use crate::error::HubError;
use crate::Result;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default management API base URL for the public registry
pub const DEFAULT_API_URL: &str = "https://hub.docker.com/v2";

/// Registry API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// API base URL, without trailing slash
    pub api_url: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: concat!("deployctl-hub-client/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

impl HubConfig {
    /// Create config for a specific API base URL
    pub fn new(api_url: &str) -> Self {
        HubConfig {
            api_url: api_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Basic-auth credentials for the management API
#[derive(Clone)]
pub struct BasicAuth {
    pub username: String,
    pub secret: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Client for registry tag management
pub struct HubClient {
    config: HubConfig,
    http_client: reqwest::Client,
}

impl HubClient {
    /// Create a new client
    pub fn new(config: HubConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HubError::ClientSetup(e.to_string()))?;

        Ok(HubClient {
            config,
            http_client,
        })
    }

    /// The configured API base URL
    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    /// URL of a single tag resource: `{api}/repositories/{namespace}/{repository}/tags/{tag}/`
    pub fn tag_url(&self, namespace: &str, repository: &str, tag: &str) -> Result<String> {
        for (what, value) in [
            ("namespace", namespace),
            ("repository", repository),
            ("tag", tag),
        ] {
            if value.is_empty() || value.contains('/') {
                return Err(HubError::InvalidReference(format!(
                    "{} '{}' must be a single non-empty path segment",
                    what, value
                )));
            }
        }

        Ok(format!(
            "{}/repositories/{}/{}/tags/{}/",
            self.config.api_url, namespace, repository, tag
        ))
    }

    /// Delete one tag
    ///
    /// Any non-2xx status is an error; callers decide whether that matters.
    pub async fn delete_tag(
        &self,
        auth: &BasicAuth,
        namespace: &str,
        repository: &str,
        tag: &str,
    ) -> Result<()> {
        let url = self.tag_url(namespace, repository, tag)?;
        debug!(url = %url, "Deleting remote tag");

        let response = self
            .http_client
            .delete(&url)
            .basic_auth(&auth.username, Some(&auth.secret))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(repository = %repository, tag = %tag, "Deleted remote tag");
            return Ok(());
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HubError::Unauthorized {
                url,
                status: status.as_u16(),
            }),
            StatusCode::NOT_FOUND => Err(HubError::NotFound(format!("{}/{}:{}", namespace, repository, tag))),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(HubError::UnexpectedStatus {
                    url,
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
