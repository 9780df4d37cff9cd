//! The `validate` command: trigger a conformance run and optionally wait
//! for its result.
//!
//! Sequence: verify prerequisites (session data, adapter resolution,
//! adapter availability), send the validation request, then, when asked,
//! watch the event feed until the run settles or the deadline passes.
//! Every failure is returned to the caller; nothing here exits the process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::client::{ClientError, MesheryClient};
use crate::config::CtlConfig;
use crate::events::{self, StreamEvent, WaitOutcome, WatchError};
use crate::operation::{self, conformance_summary, Operation, OperationError};
use crate::session::{self, MeshAdapter, ValidationTarget};
use crate::token::load_token;

/// Errors from a `validate` run.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    /// Configuration could not be loaded or names an unknown context.
    #[error("failed to load configuration: {0:#}")]
    Config(anyhow::Error),
    /// The auth token file could not be loaded.
    #[error("failed to load auth token: {0:#}")]
    Token(anyhow::Error),
    /// Session preferences could not be fetched.
    #[error("failed to fetch session data: {0}")]
    Session(#[source] ClientError),
    /// The available adapter list could not be fetched.
    #[error("failed to fetch available adapters: {0}")]
    Adapters(#[source] ClientError),
    /// The resolved adapter is not served by the server.
    #[error("adapter {requested:?} is not available (available: {available:?})")]
    AdapterUnavailable {
        /// Adapter that was asked for, after resolution.
        requested: String,
        /// Locations the server reported.
        available: Vec<String>,
    },
    /// The validation request could not be built or sent.
    #[error("failed to send validation request: {0}")]
    Request(#[from] OperationError),
    /// The event feed could not be opened, failed, or closed early.
    #[error("failed to watch validation events: {0}")]
    Watch(#[from] WatchError),
    /// No result arrived before the deadline.
    #[error("timed out after {}s waiting for the validation response", .0.as_secs())]
    Timeout(Duration),
    /// The server reported that the conformance tests failed.
    #[error("{spec} conformance tests failed: {summary}")]
    ConformanceFailed {
        /// Specification that was validated.
        spec: String,
        /// Summary of the failing event.
        summary: String,
    },
}

/// Inputs of one `validate` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Mesh name given on the command line.
    pub mesh: String,
    /// Specification to validate against, e.g. `smi`.
    pub spec: String,
    /// Adapter name or location.
    pub adapter: String,
    /// Namespace the conformance tests run in.
    pub namespace: String,
    /// Wait for the result on the event feed.
    pub watch: bool,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Adapter and mesh after resolution.
    pub target: ValidationTarget,
    /// Server acknowledgement of the validation request.
    pub acknowledgement: String,
    /// Event that confirmed completion, when watching.
    pub event: Option<StreamEvent>,
}

/// Build an API client for the selected context.
///
/// `token_override` (the `--token` flag) wins over the context's token path.
///
/// # Errors
///
/// Returns [`ValidateError::Config`] for an unknown context and
/// [`ValidateError::Token`] if the token file cannot be loaded.
pub fn build_client(
    config: &CtlConfig,
    context: Option<&str>,
    token_override: Option<&Path>,
) -> Result<MesheryClient, ValidateError> {
    let ctx = config.context(context).map_err(ValidateError::Config)?;
    let token_path: Option<PathBuf> = token_override.map(Path::to_path_buf).or(ctx.token);
    let token = token_path
        .as_deref()
        .map(load_token)
        .transpose()
        .map_err(ValidateError::Token)?;
    info!(context = %ctx.name, server = %ctx.base_url, auth = token.is_some(), "using Meshery server");
    Ok(MesheryClient::new(ctx.base_url, token))
}

/// Runs conformance validation against one server.
#[derive(Debug, Clone)]
pub struct Validator {
    client: MesheryClient,
    watch_timeout: Duration,
}

impl Validator {
    /// Create a validator that waits at most `watch_timeout` for a result.
    pub fn new(client: MesheryClient, watch_timeout: Duration) -> Self {
        Self {
            client,
            watch_timeout,
        }
    }

    /// Resolve the adapter against the session and check the server serves it.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError`] if session data or the adapter list cannot be
    /// fetched, or the adapter is not available.
    pub async fn verify_prerequisites(
        &self,
        target: &mut ValidationTarget,
    ) -> Result<(), ValidateError> {
        info!("verifying prerequisites");

        let prefs = session::fetch_session_data(&self.client)
            .await
            .map_err(ValidateError::Session)?;
        target.resolve(&prefs.mesh_adapters);

        let available = session::fetch_adapters(&self.client)
            .await
            .map_err(ValidateError::Adapters)?;
        ensure_available(&target.mesh, &available)?;

        info!(adapter = %target.adapter, "verified prerequisites");
        Ok(())
    }

    /// Ask the server to start conformance validation of `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::Request`] if the request cannot be built or
    /// the server does not accept it.
    pub async fn trigger(
        &self,
        target: &ValidationTarget,
        spec: &str,
        namespace: &str,
    ) -> Result<String, ValidateError> {
        let op = Operation::validate(target.adapter.clone(), spec, namespace);
        Ok(operation::send_operation(&self.client, &op).await?)
    }

    /// Wait on the event feed for the result of a `spec` conformance run.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::Timeout`] when nothing settles the wait in
    /// time, [`ValidateError::ConformanceFailed`] when the server reports an
    /// error, and [`ValidateError::Watch`] when the feed itself fails.
    pub async fn watch(&self, spec: &str) -> Result<StreamEvent, ValidateError> {
        info!("verifying operation");
        let query = conformance_summary(spec);
        let outcome =
            events::wait_for_validate_response(&self.client, &query, self.watch_timeout).await?;
        settle(outcome, spec, self.watch_timeout)
    }

    /// Run the whole command.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidateError`] any step hits.
    pub async fn run(&self, options: &ValidateOptions) -> Result<ValidationReport, ValidateError> {
        let mut target = ValidationTarget::new(options.adapter.clone(), options.mesh.clone());
        self.verify_prerequisites(&mut target).await?;

        info!(mesh = %target.mesh, spec = %options.spec, "starting service mesh validation");
        let acknowledgement = self
            .trigger(&target, &options.spec, &options.namespace)
            .await?;
        info!(mesh = %target.mesh, "validation request accepted");

        let event = if options.watch {
            let event = self.watch(&options.spec).await?;
            info!(summary = %event.summary, details = %event.details, "validation successful");
            Some(event)
        } else {
            None
        };

        Ok(ValidationReport {
            target,
            acknowledgement,
            event,
        })
    }
}

/// Fail unless `mesh` names one of the `available` adapters, by full
/// location or by short name.
///
/// # Errors
///
/// Returns [`ValidateError::AdapterUnavailable`] listing what is available.
pub fn ensure_available(mesh: &str, available: &[MeshAdapter]) -> Result<(), ValidateError> {
    let found = available
        .iter()
        .any(|adapter| adapter.location == mesh || adapter.short_name() == mesh);
    if found {
        return Ok(());
    }
    Err(ValidateError::AdapterUnavailable {
        requested: mesh.to_owned(),
        available: available.iter().map(|a| a.location.clone()).collect(),
    })
}

/// Turn a wait outcome into the command result.
///
/// # Errors
///
/// Returns [`ValidateError::ConformanceFailed`] or [`ValidateError::Timeout`].
pub fn settle(
    outcome: WaitOutcome,
    spec: &str,
    timeout: Duration,
) -> Result<StreamEvent, ValidateError> {
    match outcome {
        WaitOutcome::Successful(event) => Ok(event),
        WaitOutcome::Error(event) => Err(ValidateError::ConformanceFailed {
            spec: spec.to_owned(),
            summary: event.summary,
        }),
        WaitOutcome::Timeout => Err(ValidateError::Timeout(timeout)),
    }
}
