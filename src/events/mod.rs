//! Server event feed: decoding and waiting for a validation result.
//!
//! The server reports progress of long-running operations on
//! `/api/events` as server-sent events whose data is a JSON object with a
//! human-readable `summary` and `details`. [`watch`] opens that feed and
//! waits, bounded by a timeout, for the event that settles a validation run.

pub mod sse;
pub mod watch;

use serde::Deserialize;

use crate::client::ClientError;

pub use watch::{open_event_stream, wait_for_outcome, wait_for_validate_response, EventStream};

/// Marker the server puts in `details` when an operation failed.
pub const ERROR_MARKER: &str = "error";

/// A decoded event from the server feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamEvent {
    /// One-line description of what happened.
    #[serde(alias = "Summary")]
    pub summary: String,
    /// Longer description, test output or error text.
    #[serde(alias = "Details")]
    pub details: String,
    /// Operation the event belongs to, when the server reports one.
    #[serde(alias = "OperationID", alias = "operationId")]
    pub operation_id: String,
}

impl StreamEvent {
    /// Event with the given summary and details.
    pub fn new(summary: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            details: details.into(),
            operation_id: String::new(),
        }
    }

    /// Decode the JSON data of one SSE frame.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Decode`] if the data is not an event object.
    pub fn from_data(data: &str) -> Result<Self, WatchError> {
        serde_json::from_str(data).map_err(|e| WatchError::Decode(format!("{e}: {data}")))
    }
}

/// How an event settles a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The summary names the awaited operation.
    Successful,
    /// The details report an error.
    Error,
}

/// Classify one event against the awaited summary text.
///
/// A summary match is checked first; the details-contain-`error` check only
/// applies when it fails. `None` means the event does not settle the wait.
pub fn classify(event: &StreamEvent, query: &str) -> Option<Classification> {
    if event.summary.contains(query) {
        Some(Classification::Successful)
    } else if event.details.contains(ERROR_MARKER) {
        Some(Classification::Error)
    } else {
        None
    }
}

/// Result of waiting on the event feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The awaited operation reported completion.
    Successful(StreamEvent),
    /// The server reported an error before completion.
    Error(StreamEvent),
    /// Nothing settled the wait before the deadline.
    Timeout,
}

/// Errors that end a wait before it is settled.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The feed request could not be built, sent, or was refused.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// The connection failed mid-stream.
    #[error("event stream transport failed: {0}")]
    Transport(reqwest::Error),
    /// A frame could not be decoded.
    #[error("failed to decode event: {0}")]
    Decode(String),
    /// The server closed the feed before a result arrived.
    #[error("event stream closed before a result arrived")]
    Closed,
}
