//! Paged reads, single records and status classification

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use coursesync_core::domain::{Endpoint, RemoteId};
use coursesync_core::ports::{FetchError, IContentDownloader, IPagedFetcher, PageQuery};

use crate::common;

#[tokio::test]
async fn test_fetch_page_sends_token_paging_and_sort() {
    let (server, provider) = common::setup_canvas_mock().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/courses/7/folders"))
        .and(header("Authorization", format!("Bearer {}", common::TOKEN).as_str()))
        .and(query_param("per_page", "200"))
        .and(query_param("page", "1"))
        .and(query_param("sort", "updated_at"))
        .and(query_param("order", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "course files", "full_name": "course files" },
            { "id": 2, "name": "Week 1", "full_name": "course files/Week 1" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = Endpoint::course_folders(&RemoteId::from(7_u64));
    let page = provider
        .fetch_page(&endpoint, &PageQuery::first(200).recent_first())
        .await
        .expect("fetch_page failed");

    assert_eq!(page.len(), 2);
    assert_eq!(page[1]["full_name"], "course files/Week 1");
}

#[tokio::test]
async fn test_endpoint_query_is_kept() {
    let (server, provider) = common::setup_canvas_mock().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/self/courses"))
        .and(query_param("enrollment_state", "active"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 42, "name": "Biology" }
        ])))
        .mount(&server)
        .await;

    let page = provider
        .fetch_page(&Endpoint::active_courses(), &PageQuery::first(100))
        .await
        .expect("fetch_page failed");
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn test_absolute_endpoints_are_used_as_is() {
    let (server, provider) = common::setup_canvas_mock().await;
    common::mount_json(&server, "/api/v1/folders/3/files", json!([])).await;

    let endpoint: Endpoint = format!("{}/api/v1/folders/3/files", server.uri())
        .parse()
        .unwrap();
    let page = provider
        .fetch_page(&endpoint, &PageQuery::first(200))
        .await
        .expect("fetch_page failed");
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_fetch_one_returns_the_record() {
    let (server, provider) = common::setup_canvas_mock().await;
    common::mount_json(
        &server,
        "/api/v1/courses/7/folders/root",
        json!({ "id": 1, "name": "course files", "full_name": "course files" }),
    )
    .await;

    let record = provider
        .fetch_one(&Endpoint::course_root_folder(&RemoteId::from(7_u64)))
        .await
        .expect("fetch_one failed");
    assert_eq!(record["id"], 1);
}

#[tokio::test]
async fn test_unauthorized_is_fatal() {
    let (server, provider) = common::setup_canvas_mock().await;
    common::mount_status(&server, "/api/v1/courses/7/tabs", 401).await;

    let err = provider
        .fetch_page(&Endpoint::course_tabs(&RemoteId::from(7_u64)), &PageQuery::first(100))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::AuthInvalid(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_missing_and_failing_endpoints_are_recoverable() {
    let (server, provider) = common::setup_canvas_mock().await;
    common::mount_status(&server, "/api/v1/courses/7/tabs", 404).await;
    common::mount_status(&server, "/api/v1/courses/8/tabs", 500).await;
    common::mount_status(&server, "/api/v1/courses/9/tabs", 403).await;

    let not_found = provider
        .fetch_page(&Endpoint::course_tabs(&RemoteId::from(7_u64)), &PageQuery::first(100))
        .await
        .unwrap_err();
    assert!(matches!(not_found, FetchError::NotFound(_)));

    for id in [8_u64, 9] {
        let err = provider
            .fetch_page(&Endpoint::course_tabs(&RemoteId::from(id)), &PageQuery::first(100))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)), "{err:?}");
        assert!(!err.is_fatal());
    }
}

#[tokio::test]
async fn test_wrong_body_shape_is_malformed() {
    let (server, provider) = common::setup_canvas_mock().await;
    common::mount_json(&server, "/api/v1/courses/7/modules", json!({ "errors": [] })).await;
    common::mount_json(&server, "/api/v1/files/5", json!([1, 2])).await;

    let err = provider
        .fetch_page(&Endpoint::course_modules(&RemoteId::from(7_u64)), &PageQuery::first(100))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::MalformedRecord { .. }));

    let err = provider
        .fetch_one(&"files/5".parse().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::MalformedRecord { .. }));
}

#[tokio::test]
async fn test_download_returns_content() {
    let (server, provider) = common::setup_canvas_mock().await;
    let content = b"lecture notes".to_vec();
    Mock::given(method("GET"))
        .and(path("/files/11/download"))
        .and(header("Authorization", format!("Bearer {}", common::TOKEN).as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.clone())
                .append_header("Content-Type", "application/pdf"),
        )
        .mount(&server)
        .await;

    let data = provider
        .download(&format!("{}/files/11/download", server.uri()))
        .await
        .expect("download failed");
    assert_eq!(data, content);

    assert!(provider.download("not a url").await.is_err());
}
