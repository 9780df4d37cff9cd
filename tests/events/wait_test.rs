//! Bounded wait over simulated event feeds.

use std::time::Duration;

use tokio_stream::StreamExt;

use meshctl::events::{wait_for_outcome, StreamEvent, WaitOutcome, WatchError};

const QUERY: &str = "Smi conformance test";
const WINDOW: Duration = Duration::from_secs(1200);

type Item = Result<StreamEvent, WatchError>;

/// Feed that emits `events` and then stays silent forever.
fn live_feed(events: Vec<Item>) -> impl tokio_stream::Stream<Item = Item> + Send + Unpin {
    tokio_stream::iter(events).chain(tokio_stream::pending())
}

#[tokio::test(start_paused = true)]
async fn matching_summary_is_successful() {
    let feed = live_feed(vec![Ok(StreamEvent::new("Smi conformance test passed", "ok"))]);

    let outcome = wait_for_outcome(feed, QUERY, WINDOW)
        .await
        .expect("wait settles");

    match outcome {
        WaitOutcome::Successful(event) => {
            assert_eq!(event.summary, "Smi conformance test passed");
            assert_eq!(event.details, "ok");
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn error_details_before_match_is_error() {
    let feed = live_feed(vec![
        Ok(StreamEvent::new("unrelated", "an error occurred")),
        Ok(StreamEvent::new("Smi conformance test passed", "ok")),
    ]);

    let outcome = wait_for_outcome(feed, QUERY, WINDOW)
        .await
        .expect("wait settles");

    assert_eq!(
        outcome,
        WaitOutcome::Error(StreamEvent::new("unrelated", "an error occurred"))
    );
}

#[tokio::test(start_paused = true)]
async fn unrelated_events_are_skipped_until_match() {
    let feed = live_feed(vec![
        Ok(StreamEvent::new("deploying adapter", "ok")),
        Ok(StreamEvent::new("running tests", "3 of 10")),
        Ok(StreamEvent::new("Smi conformance test completed", "10 passed")),
    ]);

    let outcome = wait_for_outcome(feed, QUERY, WINDOW)
        .await
        .expect("wait settles");

    assert!(matches!(outcome, WaitOutcome::Successful(ref e) if e.details == "10 passed"));
}

#[tokio::test(start_paused = true)]
async fn silent_feed_times_out_after_window() {
    let feed = live_feed(vec![Ok(StreamEvent::new("deploying adapter", "ok"))]);
    let started = tokio::time::Instant::now();

    let outcome = wait_for_outcome(feed, QUERY, WINDOW)
        .await
        .expect("timeout is an outcome, not an error");

    assert_eq!(outcome, WaitOutcome::Timeout);
    assert!(started.elapsed() >= WINDOW);
}

#[tokio::test(start_paused = true)]
async fn match_just_before_deadline_wins() {
    let (tx, rx) = tokio::sync::mpsc::channel::<Item>(1);
    tokio::spawn(async move {
        tokio::time::sleep(WINDOW - Duration::from_secs(1)).await;
        let _ = tx
            .send(Ok(StreamEvent::new("Smi conformance test passed", "ok")))
            .await;
    });
    let feed = tokio_stream::wrappers::ReceiverStream::new(rx);

    let outcome = wait_for_outcome(feed, QUERY, WINDOW)
        .await
        .expect("wait settles");

    assert!(matches!(outcome, WaitOutcome::Successful(_)));
}

#[tokio::test(start_paused = true)]
async fn decode_failure_before_match_is_fatal() {
    let feed = live_feed(vec![
        Err(WatchError::Decode("not json".to_owned())),
        Ok(StreamEvent::new("Smi conformance test passed", "ok")),
    ]);

    let err = wait_for_outcome(feed, QUERY, WINDOW)
        .await
        .expect_err("decode failure ends the wait");

    assert!(matches!(err, WatchError::Decode(_)));
}

#[tokio::test(start_paused = true)]
async fn feed_closing_without_match_is_closed_error() {
    let feed = tokio_stream::iter(vec![Ok(StreamEvent::new("deploying adapter", "ok"))]);

    let err = wait_for_outcome(feed, QUERY, WINDOW)
        .await
        .expect_err("closed feed ends the wait");

    assert!(matches!(err, WatchError::Closed));
}
