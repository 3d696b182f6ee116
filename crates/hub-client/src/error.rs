//! Error types for hub-client

use thiserror::Error;

/// Errors that can occur when talking to the registry management API
#[derive(Error, Debug)]
pub enum HubError {
    /// HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    /// Transport-level failure (DNS, TLS, connection refused, timeout)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Credentials were rejected
    #[error("Authentication rejected for {url} (status {status})")]
    Unauthorized { url: String, status: u16 },

    /// Tag or repository does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success status
    #[error("Unexpected status {status} from {url}: {body}")]
    UnexpectedStatus { url: String, status: u16, body: String },

    /// Invalid input (empty namespace, repository or tag)
    #[error("Invalid tag reference: {0}")]
    InvalidReference(String),
}

impl From<reqwest::Error> for HubError {
    fn from(err: reqwest::Error) -> Self {
        HubError::Http(err.to_string())
    }
}
