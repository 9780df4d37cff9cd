//! Bounded wait for the event that settles a validation run.
//!
//! A background task reads the feed and hands exactly one verdict to the
//! caller over a oneshot channel; the caller races it against a timer. The
//! task is owned by an abort-on-drop guard, so the feed connection is
//! released on every exit path.

use std::pin::Pin;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::Method;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::sse::SseStream;
use super::{classify, Classification, StreamEvent, WaitOutcome, WatchError};
use crate::client::{sanitize_http_error_body, ClientError, MesheryClient};

/// Event feed endpoint, tagged with the client name the server logs.
pub const EVENTS_PATH: &str = "/api/events?client=cli_validate";

/// Decoded event feed.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, WatchError>> + Send>>;

/// Open the server event feed.
///
/// # Errors
///
/// Returns [`WatchError::Client`] if the request cannot be built (for
/// example a malformed base URL, in which case nothing is sent), the
/// connection fails, or the server answers with a non-success status.
pub async fn open_event_stream(client: &MesheryClient) -> Result<EventStream, WatchError> {
    let request = client
        .request(Method::GET, EVENTS_PATH)?
        .header(ACCEPT, "text/event-stream");

    let response = request.send().await.map_err(ClientError::from)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        }
        .into());
    }
    debug!(url = %response.url(), "event stream opened");

    let frames = SseStream::new(Box::pin(response.bytes_stream()));
    let events = frames.map(|frame| frame.and_then(|f| StreamEvent::from_data(&f.data)));
    Ok(Box::pin(events))
}

/// Open the feed and wait for the event that settles `query`.
///
/// # Errors
///
/// Returns [`WatchError`] if the feed cannot be opened, fails, or closes
/// before anything settles the wait.
pub async fn wait_for_validate_response(
    client: &MesheryClient,
    query: &str,
    timeout: Duration,
) -> Result<WaitOutcome, WatchError> {
    let events = open_event_stream(client).await?;
    wait_for_outcome(events, query, timeout).await
}

/// Wait until an event settles `query` or `timeout` elapses.
///
/// Events are inspected in arrival order and the first one that classifies
/// decides the outcome. Reaching the deadline yields
/// [`WaitOutcome::Timeout`].
///
/// # Errors
///
/// Returns [`WatchError`] if the feed fails or closes before the wait is
/// settled.
pub async fn wait_for_outcome<S>(
    events: S,
    query: &str,
    timeout: Duration,
) -> Result<WaitOutcome, WatchError>
where
    S: Stream<Item = Result<StreamEvent, WatchError>> + Send + Unpin + 'static,
{
    let (tx, rx) = oneshot::channel();
    let query = query.to_owned();
    let _reader = AbortOnDrop(tokio::spawn(async move {
        let verdict = scan(events, &query).await;
        // The receiver is gone once the caller timed out.
        let _ = tx.send(verdict);
    }));

    tokio::select! {
        biased;
        verdict = rx => verdict.unwrap_or(Err(WatchError::Closed)),
        () = tokio::time::sleep(timeout) => {
            warn!(timeout_secs = timeout.as_secs(), "no matching event before deadline");
            Ok(WaitOutcome::Timeout)
        }
    }
}

async fn scan<S>(mut events: S, query: &str) -> Result<WaitOutcome, WatchError>
where
    S: Stream<Item = Result<StreamEvent, WatchError>> + Unpin,
{
    while let Some(event) = events.next().await {
        let event = event?;
        match classify(&event, query) {
            Some(Classification::Successful) => {
                info!(summary = %event.summary, details = %event.details, "operation completed");
                return Ok(WaitOutcome::Successful(event));
            }
            Some(Classification::Error) => {
                info!(summary = %event.summary, "operation reported an error");
                return Ok(WaitOutcome::Error(event));
            }
            None => debug!(summary = %event.summary, "skipping unrelated event"),
        }
    }
    Err(WatchError::Closed)
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
