//! hub-client: registry management API access for deployctl
//!
//! Thin HTTP layer over the Docker Hub style management API. The only
//! operation deployctl needs is tag deletion, used for best-effort remote
//! cleanup when a deployment is torn down.

pub mod client;
pub mod error;

pub use client::{BasicAuth, HubClient, HubConfig, DEFAULT_API_URL};
pub use error::HubError;

/// Result type for hub-client operations
pub type Result<T> = std::result::Result<T, HubError>;
