//! Workspace and company clients against a real HTTP server (wiremock).

mod common;

use std::time::Duration;

use common::stored_event;
use hyrelog::{
    Actor, ClientConfig, CompanyClient, EventInput, HyreLogError, QueryOptions, RetryConfig,
    WorkspaceClient,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// HELPERS
// =============================================================================

fn fast_retry() -> RetryConfig {
    RetryConfig::default()
        .with_initial_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_millis(50))
}

fn workspace(server: &MockServer) -> WorkspaceClient {
    WorkspaceClient::new(
        ClientConfig::new("hlk_ws_test_key")
            .with_base_url(server.uri())
            .with_retry(fast_retry()),
    )
    .unwrap()
}

fn company(server: &MockServer) -> CompanyClient {
    CompanyClient::new(
        ClientConfig::new("hlk_co_test_key")
            .with_base_url(server.uri())
            .with_retry(fast_retry()),
    )
    .unwrap()
}

fn page_of(n: usize) -> serde_json::Value {
    let data: Vec<_> = (0..n)
        .map(|i| stored_event(&format!("e{}", i), "user.login"))
        .collect();
    json!({
        "data": data,
        "pagination": {"page": 2, "limit": 10, "total": 25, "totalPages": 3},
    })
}

// =============================================================================
// INGESTION
// =============================================================================

#[tokio::test]
async fn test_log_event_sends_key_and_camel_case_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/key/workspace/events"))
        .and(header("x-hyrelog-key", "hlk_ws_test_key"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "action": "user.updated",
            "category": "auth",
            "actor": {"id": "u1", "email": "a@example.com"},
            "projectId": "p1",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(stored_event("e1", "user.updated")))
        .expect(1)
        .mount(&server)
        .await;

    let client = workspace(&server);
    let event = client
        .log_event(
            EventInput::new("user.updated", "auth")
                .with_actor(Actor::new("u1").with_email("a@example.com"))
                .with_project_id("p1"),
        )
        .await
        .unwrap();

    assert_eq!(event.id, "e1");
    assert_eq!(event.company_id, "c1");
    assert!(!event.archived);
}

#[tokio::test]
async fn test_log_event_accepts_wrapped_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/key/workspace/events"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"event": stored_event("e7", "user.created")})),
        )
        .mount(&server)
        .await;

    let event = workspace(&server)
        .log_event(EventInput::new("user.created", "auth"))
        .await
        .unwrap();
    assert_eq!(event.id, "e7");
}

#[tokio::test]
async fn test_log_event_empty_action_never_hits_network() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let err = workspace(&server)
        .log_event(EventInput::new("", "auth"))
        .await
        .unwrap_err();
    assert!(matches!(err, HyreLogError::Validation { .. }));
}

#[tokio::test]
async fn test_log_batch_posts_events_array() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/key/workspace/events/batch"))
        .and(body_json(json!({"events": [
            {"action": "a.one", "category": "test"},
            {"action": "a.two", "category": "test"},
        ]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"events": [
            stored_event("e1", "a.one"),
            stored_event("e2", "a.two"),
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let events = workspace(&server)
        .log_batch(vec![
            EventInput::new("a.one", "test"),
            EventInput::new("a.two", "test"),
        ])
        .await
        .unwrap();
    let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e1", "e2"]);
}

// =============================================================================
// QUERIES
// =============================================================================

#[tokio::test]
async fn test_query_events_encodes_filters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/key/workspace/events"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "10"))
        .and(query_param("actorEmail", "a@example.com"))
        .and(query_param("from", "2026-01-01T00:00:00.000Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(10)))
        .expect(1)
        .mount(&server)
        .await;

    let from = chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let response = workspace(&server)
        .query_events(
            QueryOptions::new()
                .page(2)
                .limit(10)
                .actor_email("a@example.com")
                .from_date(from),
        )
        .await
        .unwrap();

    assert_eq!(response.data.len(), 10);
    assert_eq!(response.pagination.total_pages, 3);
    assert!(response.has_next_page());
}

#[tokio::test]
async fn test_company_queries_use_company_routes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/key/company/events"))
        .and(query_param("workspaceId", "w1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(1)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/key/company/events/global"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_of(2)))
        .expect(1)
        .mount(&server)
        .await;

    let client = company(&server);
    let scoped = client
        .query_events(QueryOptions::new().workspace_id("w1"))
        .await
        .unwrap();
    let global = client.query_global_events(QueryOptions::new()).await.unwrap();

    assert_eq!(scoped.data.len(), 1);
    assert_eq!(global.data.len(), 2);
}

#[tokio::test]
async fn test_get_regions_returns_object() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/key/company/regions"))
        .and(header("x-hyrelog-key", "hlk_co_test_key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"dataRegion": "EU", "replicas": ["US"]})),
        )
        .mount(&server)
        .await;

    let regions = company(&server).get_regions().await.unwrap();
    assert_eq!(regions["dataRegion"], json!("EU"));
}

// =============================================================================
// ERRORS
// =============================================================================

#[tokio::test]
async fn test_html_success_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/key/workspace/events"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = workspace(&server)
        .query_events(QueryOptions::new())
        .await
        .unwrap_err();
    match err {
        HyreLogError::MalformedResponse { excerpt, .. } => assert!(excerpt.contains("<html>")),
        other => panic!("expected MalformedResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_data_array_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/key/workspace/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let err = workspace(&server)
        .query_events(QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HyreLogError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid key"})))
        .expect(1)
        .mount(&server)
        .await;

    let err = company(&server)
        .query_events(QueryOptions::new())
        .await
        .unwrap_err();
    match err {
        HyreLogError::Api { status_code, body } => {
            assert_eq!(status_code, 401);
            assert!(body.contains("invalid key"));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transient_503_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/key/company/regions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/key/company/regions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dataRegion": "AU"})))
        .expect(1)
        .mount(&server)
        .await;

    let regions = company(&server).get_regions().await.unwrap();
    assert_eq!(regions["dataRegion"], json!("AU"));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let client = WorkspaceClient::new(
        ClientConfig::new("hlk_ws_test_key")
            .with_base_url("http://127.0.0.1:9")
            .with_retry(RetryConfig::disabled()),
    )
    .unwrap();

    let err = client
        .log_event(EventInput::new("user.created", "auth"))
        .await
        .unwrap_err();
    assert!(matches!(err, HyreLogError::Network { .. }));
}

#[tokio::test]
async fn test_closed_client_rejects_queries() {
    let server = MockServer::start().await;
    let client = company(&server);
    client.close().await;

    let err = client.query_events(QueryOptions::new()).await.unwrap_err();
    assert!(matches!(err, HyreLogError::ClientClosed));
}
