//! Registry credential discovery.
//!
//! Credentials come from explicit configuration when both halves are set,
//! otherwise from the local docker credential store
//! (`config.json` → `auths` → `auth`). Failing to find credentials is
//! never an error: it only disables remote cleanup during teardown.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::RunConfig;

/// Credential store keys tried in order: default host first, then alias.
pub const REGISTRY_KEYS: &[&str] = &["https://index.docker.io/v1/", "docker.io"];

/// URL-safe alphabet, padding optional.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    ExplicitConfig,
    Discovered,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
    pub provenance: Provenance,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("provenance", &self.provenance)
            .finish()
    }
}

impl From<&Credentials> for hub_client::BasicAuth {
    fn from(creds: &Credentials) -> Self {
        hub_client::BasicAuth {
            username: creds.username.clone(),
            secret: creds.secret.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("value is not valid base64 under any supported alphabet")]
    Base64,
    #[error("decoded value is not a single 'user:secret' pair")]
    Separator,
}

/// Shape of the docker credential store; unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct CredentialStore {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthEntry {
    auth: Option<String>,
}

/// Decode a stored `auth` value, strict alphabet first, then lenient.
///
/// A codec's output is accepted only when it is UTF-8 with exactly one `:`.
pub fn decode_with_fallback(raw: &str) -> Result<(String, String), DecodeError> {
    let raw = raw.trim();
    let mut decoded_any = false;

    for engine in [&STANDARD, &LENIENT] {
        let Ok(bytes) = engine.decode(raw) else {
            continue;
        };
        decoded_any = true;
        let Ok(text) = String::from_utf8(bytes) else {
            continue;
        };
        if text.matches(':').count() != 1 {
            continue;
        }
        if let Some((user, secret)) = text.split_once(':') {
            return Ok((user.to_string(), secret.to_string()));
        }
    }

    if decoded_any {
        Err(DecodeError::Separator)
    } else {
        Err(DecodeError::Base64)
    }
}

/// Resolves registry credentials for one run.
pub struct CredentialResolver<'a> {
    config: &'a RunConfig,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }

    pub fn resolve(&self) -> Option<Credentials> {
        if let (Some(username), Some(secret)) =
            (&self.config.explicit_username, &self.config.explicit_secret)
        {
            debug!(username = %username, "Using explicitly configured registry credentials");
            return Some(Credentials {
                username: username.clone(),
                secret: secret.clone(),
                provenance: Provenance::ExplicitConfig,
            });
        }

        let path = self.config.credential_store.as_deref()?;
        discover(path)
    }
}

/// Look up credentials in a credential store file.
pub fn discover(path: &Path) -> Option<Credentials> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No readable credential store");
            return None;
        }
    };

    let store: CredentialStore = match serde_json::from_str(&content) {
        Ok(store) => store,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Credential store is not valid JSON");
            return None;
        }
    };

    let (key, raw) = REGISTRY_KEYS.iter().find_map(|key| {
        store
            .auths
            .get(*key)
            .and_then(|entry| entry.auth.as_deref())
            .map(|raw| (*key, raw))
    })?;

    match decode_with_fallback(raw) {
        Ok((username, secret)) => {
            debug!(key = %key, username = %username, "Discovered registry credentials");
            Some(Credentials {
                username,
                secret,
                provenance: Provenance::Discovered,
            })
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Ignoring undecodable credential store entry");
            None
        }
    }
}
