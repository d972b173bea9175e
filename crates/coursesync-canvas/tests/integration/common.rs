//! Shared test helpers for Canvas API integration tests

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coursesync_canvas::{CanvasClient, CanvasProvider};

pub const TOKEN: &str = "test-access-token";

/// Starts a mock Canvas instance and returns a provider pointing at it
///
/// Throttled requests are retried twice with a short default wait.
pub async fn setup_canvas_mock() -> (MockServer, CanvasProvider) {
    let server = MockServer::start().await;
    let client = CanvasClient::new(&server.uri(), TOKEN)
        .expect("mock server URI is valid")
        .with_max_retries(2)
        .with_default_retry_after(Duration::from_millis(10));
    (server, CanvasProvider::new(client))
}

/// Mounts a JSON response for `GET <path>`
pub async fn mount_json(server: &MockServer, api_path: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(api_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts a bare status response for `GET <path>`
pub async fn mount_status(server: &MockServer, api_path: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(api_path))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
