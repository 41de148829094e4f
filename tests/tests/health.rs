//! Tests for the health/readiness HTTP surface.

use axum::http::StatusCode;
use axum_test::TestServer;

fn server() -> TestServer {
    let app = api::router(api::AppState::default());
    TestServer::new(app).expect("failed to create test server")
}

#[tokio::test]
async fn health_endpoint_has_expected_shape() {
    let server = server();
    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert!(body.get("status").is_some());
    assert!(body.get("broker_connected").is_some());
    assert!(body.get("registry_connected").is_some());
    assert!(body.get("owned_partitions").is_some());
}

#[tokio::test]
async fn ready_endpoint_returns_ok_or_unavailable() {
    let server = server();
    let response = server.get("/health/ready").await;
    let status = response.status_code();
    assert!(status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn live_endpoint_always_ok() {
    let server = server();
    let response = server.get("/health/live").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn health_endpoints_require_no_auth() {
    let server = server();
    for path in ["/health", "/health/ready", "/health/live"] {
        let response = server.get(path).await;
        assert_ne!(response.status_code(), StatusCode::UNAUTHORIZED);
    }
}
