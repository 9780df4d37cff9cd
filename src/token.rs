//! Meshery auth token loading.
//!
//! The token file is the JSON document the Meshery UI hands out:
//! `{"meshery-provider": "...", "token": "..."}`. Both values travel to the
//! server as cookies on every request.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

/// Auth token used to talk to the Meshery API.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AuthToken {
    /// Remote provider the token was issued by.
    #[serde(rename = "meshery-provider", default)]
    pub provider: String,
    /// Session token.
    pub token: String,
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("provider", &self.provider)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl AuthToken {
    /// Parse a token document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the token is empty.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let token: AuthToken = serde_json::from_str(json).context("malformed token file")?;
        anyhow::ensure!(!token.token.trim().is_empty(), "token file has an empty token");
        Ok(token)
    }

    /// `Cookie` header value carrying the token and its provider.
    pub fn cookie_header(&self) -> String {
        if self.provider.is_empty() {
            format!("token={}", self.token)
        } else {
            format!("token={}; meshery-provider={}", self.token, self.provider)
        }
    }
}

/// Load an auth token from a JSON file.
///
/// Readable-by-others files are accepted with a warning.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_token(path: &Path) -> anyhow::Result<AuthToken> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read token file {}", path.display()))?;
    warn_on_broad_permissions(path);
    AuthToken::from_json(&contents)
        .with_context(|| format!("failed to load token from {}", path.display()))
}

#[cfg(unix)]
fn warn_on_broad_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = fs::metadata(path) {
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            warn!(
                path = %path.display(),
                mode = %format_args!("{mode:o}"),
                "token file is accessible by other users"
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_on_broad_permissions(_path: &Path) {}
