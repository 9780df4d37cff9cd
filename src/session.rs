//! Session preferences and the adapter registry.
//!
//! The server keeps the list of mesh adapters known to the current user in
//! its session preferences. meshctl reads that list to turn a short adapter
//! name such as `meshery-osm` into its network location
//! (`meshery-osm:10009`), then checks the location against the adapters the
//! server can currently reach.

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::client::{ClientError, MesheryClient};

/// Session preferences endpoint.
pub const SESSION_PATH: &str = "/api/system/sync";

/// Available adapters endpoint.
pub const ADAPTERS_PATH: &str = "/api/system/adapters";

/// A mesh adapter registered with the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MeshAdapter {
    /// Network location, `name:port`.
    #[serde(rename = "adapter_location")]
    pub location: String,
    /// Human-readable adapter name.
    pub name: String,
    /// Adapter version.
    pub version: String,
    /// Commit the adapter was built from.
    pub git_commit_sha: String,
}

impl MeshAdapter {
    /// Adapter with only a location set.
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }

    /// Leading segment of the location, before the first `:`.
    pub fn short_name(&self) -> &str {
        self.location
            .split_once(':')
            .map_or(self.location.as_str(), |(name, _)| name)
    }
}

/// Session preferences returned by the server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Preference {
    /// Adapters registered for this session.
    #[serde(rename = "meshAdapters", deserialize_with = "null_as_empty")]
    pub mesh_adapters: Vec<MeshAdapter>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<MeshAdapter>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<MeshAdapter>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fetch session preferences.
///
/// # Errors
///
/// Returns [`ClientError`] on URL, transport, status, or parse failure.
pub async fn fetch_session_data(client: &MesheryClient) -> Result<Preference, ClientError> {
    client.get_json(SESSION_PATH).await
}

/// Fetch the adapters the server can currently reach.
///
/// # Errors
///
/// Returns [`ClientError`] on URL, transport, status, or parse failure.
pub async fn fetch_adapters(client: &MesheryClient) -> Result<Vec<MeshAdapter>, ClientError> {
    client.get_json(ADAPTERS_PATH).await
}

/// Find the location of the adapter whose short name equals `requested`.
///
/// Every entry is scanned and the last match wins. Returns `None` when no
/// entry matches.
pub fn resolve_adapter<'a>(requested: &str, adapters: &'a [MeshAdapter]) -> Option<&'a str> {
    adapters
        .iter()
        .rev()
        .find(|adapter| adapter.short_name() == requested)
        .map(|adapter| adapter.location.as_str())
}

/// Adapter and mesh identifiers used by the rest of a validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTarget {
    /// Adapter identifier sent in the operation payload.
    pub adapter: String,
    /// Mesh identifier checked against the available adapters.
    pub mesh: String,
}

impl ValidationTarget {
    /// Start from the identifiers given on the command line.
    pub fn new(adapter: impl Into<String>, mesh: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            mesh: mesh.into(),
        }
    }

    /// Rewrite both identifiers to the registered location of `self.adapter`.
    ///
    /// Leaves both unchanged when the adapter is not registered.
    pub fn resolve(&mut self, adapters: &[MeshAdapter]) {
        match resolve_adapter(&self.adapter, adapters) {
            Some(location) => {
                debug!(adapter = %self.adapter, location, "resolved adapter location");
                self.adapter = location.to_owned();
                self.mesh = location.to_owned();
            }
            None => debug!(adapter = %self.adapter, "adapter not in session, using as given"),
        }
    }
}
