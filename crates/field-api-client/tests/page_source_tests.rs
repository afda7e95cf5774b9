use field_api_client::{ApiError, ClientConfig, FieldApiClient, PageSource};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn setup(server: &MockServer) -> FieldApiClient {
    FieldApiClient::new(ClientConfig::new(server.uri())).unwrap()
}

#[tokio::test]
async fn fetch_page_sends_paging_and_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/leads"))
        .and(query_param("offset", "25"))
        .and(query_param("limit", "25"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{ "id": "lead-26", "name": "Ravi" }],
            "total": 26
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = setup(&server);
    let page = client.fetch_page("leads", 25, 25, "tok-1").await.unwrap();
    assert_eq!(page.total, 26);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0]["id"], "lead-26");
}

#[tokio::test]
async fn missing_items_defaults_to_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "total": 0 })))
        .mount(&server)
        .await;

    let page = setup(&server).fetch_page("customers", 0, 25, "t").await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn unauthorized_maps_to_401_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;

    let err = setup(&server).fetch_page("leads", 0, 25, "old").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!err.is_transient());
    match err {
        ApiError::Status { status, message, .. } => {
            assert_eq!(status, 401);
            assert_eq!(message, "token expired");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "17"))
        .mount(&server)
        .await;

    let err = setup(&server).fetch_page("leads", 0, 25, "t").await.unwrap_err();
    assert!(err.is_rate_limited());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(17)));
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = setup(&server).fetch_page("leads", 0, 25, "t").await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(err.is_transient());
}

#[tokio::test]
async fn timeout_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "items": [], "total": 0 }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = FieldApiClient::new(ClientConfig {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(50),
    })
    .unwrap();
    let err = client.fetch_page("leads", 0, 25, "t").await.unwrap_err();
    assert!(matches!(err, ApiError::Http(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn malformed_body_is_json_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = setup(&server).fetch_page("leads", 0, 25, "t").await.unwrap_err();
    assert!(matches!(err, ApiError::Json(_)));
    assert!(!err.is_transient());
}
