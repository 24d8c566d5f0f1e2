//! Mock server helpers for the upstream endpoint

use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::constants::*;

/// Full URL of the bundle endpoint on `server`
pub fn bundle_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), BUNDLE_PATH)
}

/// Serve `body` at the bundle endpoint with status 200
pub async fn mock_bundle(server: &MockServer, body: Vec<u8>) {
    mock_bundle_with_status(server, 200, body).await;
}

/// Serve `body` at the bundle endpoint with the given status
pub async fn mock_bundle_with_status(server: &MockServer, status: u16, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(BUNDLE_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Serve `body` after a delay
pub async fn mock_slow_bundle(server: &MockServer, body: Vec<u8>, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(BUNDLE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Serve a broken body for the first `fail_count` requests, then `body`
pub async fn mock_flaky_bundle(server: &MockServer, fail_count: u64, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(BUNDLE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_bytes(NOT_A_ZIP))
        .up_to_n_times(fail_count)
        .mount(server)
        .await;

    mock_bundle(server, body).await;
}

/// Number of requests the server has received
pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}
