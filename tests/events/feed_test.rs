//! Event feed over a real HTTP connection.

use std::time::Duration;

use meshctl::client::{ClientError, MesheryClient};
use meshctl::events::{open_event_stream, wait_for_validate_response, WaitOutcome, WatchError};
use meshctl::token::AuthToken;

use crate::http_server::{FakeServer, Route};

const QUERY: &str = "Smi conformance test";

fn frame(summary: &str, details: &str) -> String {
    format!("data: {{\"summary\":\"{summary}\",\"details\":\"{details}\"}}\n\n")
}

#[tokio::test]
async fn feed_request_asks_for_event_stream() {
    let server = FakeServer::start(vec![Route::events(
        frame("Smi conformance test passed", "ok"),
        true,
    )])
    .await;
    let token = AuthToken::from_json(r#"{"meshery-provider":"Meshery","token":"t0k"}"#)
        .expect("valid token");
    let client = MesheryClient::new(&server.base_url, Some(token));

    let outcome = wait_for_validate_response(&client, QUERY, Duration::from_secs(5))
        .await
        .expect("wait settles");
    assert!(matches!(outcome, WaitOutcome::Successful(_)));

    let requests = server.requests_to("/api/events");
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.target, "/api/events?client=cli_validate");
    assert_eq!(request.header("accept").as_deref(), Some("text/event-stream"));
    assert_eq!(
        request.header("cookie").as_deref(),
        Some("token=t0k; meshery-provider=Meshery")
    );
}

#[tokio::test]
async fn connection_is_released_after_match() {
    let server = FakeServer::start(vec![Route::events(
        frame("Smi conformance test passed", "ok"),
        true,
    )])
    .await;
    let client = MesheryClient::new(&server.base_url, None);

    let outcome = wait_for_validate_response(&client, QUERY, Duration::from_secs(5))
        .await
        .expect("wait settles");
    assert!(matches!(outcome, WaitOutcome::Successful(_)));

    assert!(
        server.wait_for_feed_close(Duration::from_secs(2)).await,
        "feed connection should be closed once the wait is settled"
    );
}

#[tokio::test]
async fn connection_is_released_after_timeout() {
    let server = FakeServer::start(vec![Route::events(
        format!(": keep-alive\n\n{}", frame("deploying adapter", "ok")),
        true,
    )])
    .await;
    let client = MesheryClient::new(&server.base_url, None);

    let outcome = wait_for_validate_response(&client, QUERY, Duration::from_millis(200))
        .await
        .expect("timeout is an outcome");
    assert_eq!(outcome, WaitOutcome::Timeout);

    assert!(
        server.wait_for_feed_close(Duration::from_secs(2)).await,
        "feed connection should be closed after the deadline"
    );
}

#[tokio::test]
async fn error_details_classify_as_error() {
    let server = FakeServer::start(vec![Route::events(
        format!(
            "{}{}",
            frame("unrelated", "an error occurred"),
            frame("Smi conformance test passed", "ok")
        ),
        false,
    )])
    .await;
    let client = MesheryClient::new(&server.base_url, None);

    let outcome = wait_for_validate_response(&client, QUERY, Duration::from_secs(5))
        .await
        .expect("wait settles");

    match outcome {
        WaitOutcome::Error(event) => assert_eq!(event.summary, "unrelated"),
        other => panic!("expected error outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn capitalized_fields_are_understood() {
    let server = FakeServer::start(vec![Route::events(
        "data: {\"Summary\":\"Smi conformance test passed\",\"Details\":\"ok\"}\n\n",
        true,
    )])
    .await;
    let client = MesheryClient::new(&server.base_url, None);

    let outcome = wait_for_validate_response(&client, QUERY, Duration::from_secs(5))
        .await
        .expect("wait settles");

    match outcome {
        WaitOutcome::Successful(event) => assert_eq!(event.details, "ok"),
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_payload_fails_the_wait() {
    let server = FakeServer::start(vec![Route::events("data: not json\n\n", true)]).await;
    let client = MesheryClient::new(&server.base_url, None);

    let err = wait_for_validate_response(&client, QUERY, Duration::from_secs(5))
        .await
        .expect_err("decode failure is fatal");

    assert!(matches!(err, WatchError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn feed_ending_without_match_is_closed() {
    let server = FakeServer::start(vec![Route::events(frame("deploying adapter", "ok"), false)])
        .await;
    let client = MesheryClient::new(&server.base_url, None);

    let err = wait_for_validate_response(&client, QUERY, Duration::from_secs(5))
        .await
        .expect_err("feed closed early");

    assert!(matches!(err, WatchError::Closed), "got {err:?}");
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let server = FakeServer::start(vec![
        Route::events("session expired", false).with_status("401 Unauthorized")
    ])
    .await;
    let client = MesheryClient::new(&server.base_url, None);

    let err = open_event_stream(&client)
        .await
        .err()
        .expect("401 must fail");

    match err {
        WatchError::Client(ClientError::HttpStatus { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "session expired");
        }
        other => panic!("expected http status error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_base_url_fails_before_any_request() {
    let server = FakeServer::start(Vec::new()).await;
    // Unparseable on purpose; the fake server only proves nothing was sent.
    let client = MesheryClient::new("http//localhost:9081", None);

    let err = wait_for_validate_response(&client, QUERY, Duration::from_secs(5))
        .await
        .expect_err("construction fails");

    assert!(
        matches!(err, WatchError::Client(ClientError::InvalidUrl { .. })),
        "got {err:?}"
    );
    assert!(server.requests().is_empty());
}
