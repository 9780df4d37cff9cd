//! Mesh operation payloads and the validation trigger.

use reqwest::Method;
use serde::Serialize;
use tracing::debug;

use crate::client::{check_http_response, ClientError, MesheryClient};

/// Adapter operation endpoint.
pub const OPERATION_PATH: &str = "/api/system/adapter/operation";

/// Namespace operations run in unless told otherwise.
pub const DEFAULT_NAMESPACE: &str = "meshery";

/// Body of a mesh operation request, sent form-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Adapter location that runs the operation.
    pub adapter: String,
    /// Free-form body forwarded to the adapter.
    pub custom_body: String,
    /// `"on"` to undo the operation, empty otherwise.
    pub delete_op: String,
    /// Target namespace.
    pub namespace: String,
    /// Operation name.
    pub query: String,
}

/// Why an [`Operation`] cannot be submitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidOperation {
    /// No adapter was given.
    #[error("operation has no adapter")]
    MissingAdapter,
    /// No operation name was given.
    #[error("operation has no query")]
    MissingQuery,
}

impl Operation {
    /// Conformance validation of `spec` (e.g. `smi`) on `adapter`.
    pub fn validate(adapter: impl Into<String>, spec: &str, namespace: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            custom_body: String::new(),
            delete_op: String::new(),
            namespace: namespace.into(),
            query: conformance_query(spec),
        }
    }

    /// Mark the operation as a delete.
    #[must_use]
    pub fn deleting(mut self, delete: bool) -> Self {
        self.delete_op = if delete { "on".to_owned() } else { String::new() };
        self
    }

    /// Whether this operation undoes a previous one.
    pub fn is_delete(&self) -> bool {
        self.delete_op == "on"
    }

    /// Check the fields the server requires.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidOperation`] if the adapter or query is empty.
    pub fn check(&self) -> Result<(), InvalidOperation> {
        if self.adapter.trim().is_empty() {
            return Err(InvalidOperation::MissingAdapter);
        }
        if self.query.trim().is_empty() {
            return Err(InvalidOperation::MissingQuery);
        }
        Ok(())
    }
}

/// Operation name the adapters use for a conformance run of `spec`.
///
/// Empty when `spec` is blank.
pub fn conformance_query(spec: &str) -> String {
    let spec = spec.trim();
    if spec.is_empty() {
        return String::new();
    }
    format!("{}_conformance", spec.to_lowercase())
}

/// Summary prefix the server emits when a conformance run of `spec` finishes.
///
/// `smi` becomes `Smi conformance test`.
pub fn conformance_summary(spec: &str) -> String {
    let spec = spec.trim().to_lowercase();
    let mut chars = spec.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    format!("{capitalized} conformance test")
}

/// Errors from submitting an operation.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// The payload is missing required fields.
    #[error("invalid operation: {0}")]
    Invalid(#[from] InvalidOperation),
    /// The request could not be built or sent, or the server refused it.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Ask the server to run `operation` and return its acknowledgement.
///
/// The server only confirms that the operation was accepted; completion is
/// reported on the event stream.
///
/// # Errors
///
/// Returns [`OperationError`] if the payload is invalid or the request fails.
pub async fn send_operation(
    client: &MesheryClient,
    operation: &Operation,
) -> Result<String, OperationError> {
    operation.check()?;
    debug!(
        adapter = %operation.adapter,
        query = %operation.query,
        namespace = %operation.namespace,
        delete = operation.is_delete(),
        "submitting operation"
    );
    let response = client
        .request(Method::POST, OPERATION_PATH)?
        .form(operation)
        .send()
        .await
        .map_err(ClientError::from)?;
    Ok(check_http_response(response).await?)
}
