//! Session and adapter list fetching.

use meshctl::client::{ClientError, MesheryClient};
use meshctl::session::{fetch_adapters, fetch_session_data};

use crate::http_server::{FakeServer, Route};

#[tokio::test]
async fn session_data_lists_mesh_adapters() {
    let server = FakeServer::start(vec![Route::json(
        "GET",
        "/api/system/sync",
        r#"{"meshAdapters":[{"adapter_location":"meshery-osm:10009","name":"OSM","version":"v0.5.0"}]}"#,
    )])
    .await;
    let client = MesheryClient::new(&server.base_url, None);

    let prefs = fetch_session_data(&client).await.expect("session loads");

    assert_eq!(prefs.mesh_adapters.len(), 1);
    assert_eq!(prefs.mesh_adapters[0].location, "meshery-osm:10009");
    assert_eq!(prefs.mesh_adapters[0].short_name(), "meshery-osm");
    assert_eq!(prefs.mesh_adapters[0].version, "v0.5.0");
}

#[tokio::test]
async fn adapter_list_decodes() {
    let server = FakeServer::start(vec![Route::json(
        "GET",
        "/api/system/adapters",
        r#"[{"adapter_location":"meshery-osm:10009"},{"adapter_location":"meshery-istio:10000"}]"#,
    )])
    .await;
    let client = MesheryClient::new(&server.base_url, None);

    let adapters = fetch_adapters(&client).await.expect("adapters load");

    let locations: Vec<&str> = adapters.iter().map(|a| a.location.as_str()).collect();
    assert_eq!(locations, vec!["meshery-osm:10009", "meshery-istio:10000"]);
}

#[tokio::test]
async fn unexpected_body_is_a_parse_error() {
    let server =
        FakeServer::start(vec![Route::text("GET", "/api/system/sync", "<html>login</html>")])
            .await;
    let client = MesheryClient::new(&server.base_url, None);

    let err = fetch_session_data(&client).await.expect_err("not json");

    assert!(matches!(err, ClientError::Parse(_)), "got {err:?}");
}

#[tokio::test]
async fn server_error_is_sanitized() {
    let server = FakeServer::start(vec![Route::text(
        "GET",
        "/api/system/sync",
        "bad session\n\n  token=abc123def456",
    )
    .with_status("500 Internal Server Error")])
    .await;
    let client = MesheryClient::new(&server.base_url, None);

    let err = fetch_session_data(&client).await.expect_err("500 fails");

    match err {
        ClientError::HttpStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "bad session [REDACTED]");
        }
        other => panic!("expected http status error, got {other}"),
    }
}
