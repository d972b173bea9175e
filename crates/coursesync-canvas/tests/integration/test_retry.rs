//! Backoff on throttled requests

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use coursesync_core::domain::{Endpoint, RemoteId};
use coursesync_core::ports::{FetchError, IPagedFetcher, PageQuery};

use crate::common;

#[tokio::test]
async fn test_throttled_request_is_retried() {
    let (server, provider) = common::setup_canvas_mock().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/courses/7/tabs"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_json(
        &server,
        "/api/v1/courses/7/tabs",
        json!([{ "id": "files" }, { "id": "modules" }]),
    )
    .await;

    let page = provider
        .fetch_page(&Endpoint::course_tabs(&RemoteId::from(7_u64)), &PageQuery::first(100))
        .await
        .expect("retry did not recover");
    assert_eq!(page.len(), 2);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_retry_limit_is_bounded() {
    let (server, provider) = common::setup_canvas_mock().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/courses/7/tabs"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = provider
        .fetch_page(&Endpoint::course_tabs(&RemoteId::from(7_u64)), &PageQuery::first(100))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
    assert!(!err.is_fatal());

    // One initial attempt plus two retries
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}
