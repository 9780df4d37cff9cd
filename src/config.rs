//! Configuration loading for meshctl.
//!
//! Loads `~/.meshery/config.toml` (or `$MESHCTL_CONFIG_PATH`, or an explicit
//! `--config` path). Every section uses `#[serde(default)]` so a missing or
//! empty file is valid.
//!
//! Precedence: env vars > config file > defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Name of the context used when none is configured.
pub const DEFAULT_CONTEXT: &str = "local";

/// Endpoint of a locally deployed Meshery server.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9081";

/// Seconds to wait for a validation result on the event stream.
pub const DEFAULT_WATCH_TIMEOUT_SECS: u64 = 1200;

// ── Top-level config ────────────────────────────────────────────

/// Top-level meshctl configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CtlConfig {
    /// Context selected when `--context` is not given.
    pub current_context: String,
    /// Named server contexts.
    pub contexts: BTreeMap<String, ContextConfig>,
    /// Event stream watch settings.
    pub watch: WatchConfig,
}

impl Default for CtlConfig {
    fn default() -> Self {
        let mut contexts = BTreeMap::new();
        contexts.insert(DEFAULT_CONTEXT.to_owned(), ContextConfig::default());
        Self {
            current_context: DEFAULT_CONTEXT.to_owned(),
            contexts,
            watch: WatchConfig::default(),
        }
    }
}

/// A single Meshery server context.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Base URL of the Meshery server.
    pub endpoint: String,
    /// Path to the auth token file for this server.
    pub token: Option<PathBuf>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            token: None,
        }
    }
}

/// Settings for `validate --watch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Seconds to wait for a matching event before giving up.
    pub timeout_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_WATCH_TIMEOUT_SECS,
        }
    }
}

impl WatchConfig {
    /// Watch timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Context resolved for one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContext {
    /// Context name.
    pub name: String,
    /// Base server URL, without a trailing slash.
    pub base_url: String,
    /// Auth token file, if any.
    pub token: Option<PathBuf>,
}

impl CtlConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// An explicit `path` wins over `$MESHCTL_CONFIG_PATH` and the default
    /// location. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the home directory cannot be determined.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path_with(|key| std::env::var(key).ok())?,
        };
        let mut config = Self::load_from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("failed to parse config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Overrides target the current context. Takes a resolver function so
    /// tests do not need to mutate the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("MESHCTL_CONTEXT") {
            self.current_context = v;
        }

        let endpoint = env("MESHCTL_ENDPOINT");
        let token = env("MESHCTL_TOKEN_PATH");
        if endpoint.is_some() || token.is_some() {
            let ctx = self
                .contexts
                .entry(self.current_context.clone())
                .or_default();
            if let Some(v) = endpoint {
                ctx.endpoint = v;
            }
            if let Some(v) = token {
                ctx.token = Some(PathBuf::from(v));
            }
        }

        if let Some(v) = env("MESHCTL_WATCH_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.watch.timeout_secs = n,
                Err(_) => tracing::warn!(
                    var = "MESHCTL_WATCH_TIMEOUT_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or has wrongly typed fields.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: CtlConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Resolve the context to talk to.
    ///
    /// `name` overrides `current_context`.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is not defined or has an empty endpoint.
    pub fn context(&self, name: Option<&str>) -> Result<ResolvedContext> {
        let name = name.unwrap_or(&self.current_context);
        let ctx = self.contexts.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.contexts.keys().map(String::as_str).collect();
            anyhow::anyhow!("context {name:?} is not defined (known contexts: {known:?})")
        })?;

        let base_url = ctx.endpoint.trim().trim_end_matches('/').to_owned();
        anyhow::ensure!(
            !base_url.is_empty(),
            "context {name:?} has an empty endpoint"
        );

        Ok(ResolvedContext {
            name: name.to_owned(),
            base_url,
            token: ctx.token.clone(),
        })
    }
}

/// Resolve the config file path using a custom env resolver.
///
/// Checks `$MESHCTL_CONFIG_PATH` first, then `~/.meshery/config.toml`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(p) = env("MESHCTL_CONFIG_PATH") {
        return Ok(PathBuf::from(p));
    }
    Ok(config_dir()?.join("config.toml"))
}

/// Resolve the default config directory (`~/.meshery/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".meshery"))
}
