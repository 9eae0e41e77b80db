//! [`MockHttp`]: an [`HttpTransport`] that serves the HyreLog routes from a
//! [`MemoryEventStore`], so real clients run their full pipeline offline.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::trace;

use super::store::{MemoryEventStore, MOCK_COMPANY_ID, MOCK_REGION};
use crate::batch::BatchOptions;
use crate::client::{routes, CompanyClient, WorkspaceClient};
use crate::config::ClientConfig;
use crate::error::{HyreLogError, Result};
use crate::transport::{
    HttpTransport, RetryConfig, TransportRequest, TransportResponse, API_KEY_HEADER,
};
use crate::types::{EventInput, QueryOptions};

pub const MOCK_BASE_URL: &str = "http://mock.hyrelog.local";
pub const MOCK_WORKSPACE_KEY: &str = "mock-workspace-key";
pub const MOCK_COMPANY_KEY: &str = "mock-company-key";

/// A request as seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
pub struct MockHttp {
    store: Arc<MemoryEventStore>,
    requests: Mutex<Vec<RecordedRequest>>,
    scripted: Mutex<VecDeque<TransportResponse>>,
}

impl MockHttp {
    pub fn new(store: Arc<MemoryEventStore>) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn store(&self) -> &Arc<MemoryEventStore> {
        &self.store
    }

    /// Serve `response` instead of routing the next request.
    pub fn push_response(&self, response: TransportResponse) {
        self.scripted.lock().push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.path == path).count()
    }

    fn route(
        &self,
        method: &Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> TransportResponse {
        match (method.as_str(), path) {
            ("POST", routes::WORKSPACE_EVENTS) => match parse_input(body) {
                Ok(input) => created(json!(self.store.add(input))),
                Err(reason) => error_response(400, &reason),
            },
            ("POST", routes::WORKSPACE_EVENTS_BATCH) => {
                let inputs = body
                    .and_then(|b| b.get("events"))
                    .and_then(Value::as_array)
                    .ok_or_else(|| "body must contain an `events` array".to_string())
                    .and_then(|events| {
                        events
                            .iter()
                            .map(|e| parse_input(Some(e)))
                            .collect::<std::result::Result<Vec<_>, _>>()
                    });
                match inputs {
                    Ok(inputs) => {
                        let stored: Vec<_> =
                            inputs.into_iter().map(|i| self.store.add(i)).collect();
                        created(json!({ "events": stored }))
                    }
                    Err(reason) => error_response(400, &reason),
                }
            }
            ("GET", routes::WORKSPACE_EVENTS)
            | ("GET", routes::COMPANY_EVENTS)
            | ("GET", routes::COMPANY_EVENTS_GLOBAL) => match parse_query(query) {
                Ok(options) => ok(json!(self.store.query(&options))),
                Err(reason) => error_response(400, &reason),
            },
            ("GET", routes::COMPANY_REGIONS) => ok(json!({
                "companyId": MOCK_COMPANY_ID,
                "dataRegion": MOCK_REGION,
                "replicaRegions": [],
            })),
            _ => error_response(404, &format!("no route for {} {}", method, path)),
        }
    }
}

#[async_trait]
impl HttpTransport for MockHttp {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let url = url::Url::parse(&request.url).map_err(|e| HyreLogError::Network {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        let path = url.path().to_string();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let body = request
            .body
            .as_deref()
            .and_then(|b| serde_json::from_str::<Value>(b).ok());

        trace!(method = %request.method, path = %path, "Mock request");
        self.requests.lock().push(RecordedRequest {
            method: request.method.clone(),
            path: path.clone(),
            query: query.clone(),
            body: body.clone(),
        });

        if let Some(scripted) = self.scripted.lock().pop_front() {
            return Ok(scripted);
        }
        if request
            .header(API_KEY_HEADER)
            .map_or(true, |key| key.trim().is_empty())
        {
            return Ok(error_response(401, "missing API key"));
        }
        Ok(self.route(&request.method, &path, &query, body.as_ref()))
    }
}

fn parse_input(body: Option<&Value>) -> std::result::Result<EventInput, String> {
    let body = body.ok_or_else(|| "missing JSON body".to_string())?;
    let input: EventInput = serde_json::from_value(body.clone()).map_err(|e| e.to_string())?;
    input.validate().map_err(|e| e.to_string())?;
    Ok(input)
}

fn parse_query(pairs: &[(String, String)]) -> std::result::Result<QueryOptions, String> {
    let mut options = QueryOptions::new();
    for (key, value) in pairs {
        match key.as_str() {
            "page" | "limit" => {
                let n: u32 = value
                    .parse()
                    .map_err(|_| format!("invalid {} '{}'", key, value))?;
                if key == "page" {
                    options.page = n;
                } else {
                    options.limit = n;
                }
            }
            "from" | "to" => {
                let date = chrono::DateTime::parse_from_rfc3339(value)
                    .map_err(|_| format!("invalid {} '{}'", key, value))?
                    .with_timezone(&chrono::Utc);
                if key == "from" {
                    options.from = Some(date);
                } else {
                    options.to = Some(date);
                }
            }
            "action" => options.action = Some(value.clone()),
            "category" => options.category = Some(value.clone()),
            "actorId" => options.actor_id = Some(value.clone()),
            "actorEmail" => options.actor_email = Some(value.clone()),
            "workspaceId" => options.workspace_id = Some(value.clone()),
            "projectId" => options.project_id = Some(value.clone()),
            _ => {}
        }
    }
    options.validate().map_err(|e| e.to_string())?;
    Ok(options)
}

fn ok(body: Value) -> TransportResponse {
    TransportResponse::new(200, body.to_string()).with_header("content-type", "application/json")
}

fn created(body: Value) -> TransportResponse {
    TransportResponse::new(201, body.to_string()).with_header("content-type", "application/json")
}

fn error_response(status: u16, message: &str) -> TransportResponse {
    TransportResponse::new(status, json!({ "error": message }).to_string())
        .with_header("content-type", "application/json")
}

/// Workspace and company clients sharing one store.
pub struct MockClients {
    pub workspace: WorkspaceClient,
    pub company: CompanyClient,
    pub store: Arc<MemoryEventStore>,
    pub http: Arc<MockHttp>,
}

/// Retry timing short enough for tests that exercise scripted failures.
pub fn fast_retry() -> RetryConfig {
    RetryConfig::default()
        .with_initial_delay(std::time::Duration::from_millis(5))
        .with_max_delay(std::time::Duration::from_millis(20))
}

/// Mock clients with default batch options.
pub fn mock_clients() -> MockClients {
    mock_clients_with(BatchOptions::default())
}

pub fn mock_clients_with(batch: BatchOptions) -> MockClients {
    let store = Arc::new(MemoryEventStore::new());
    let http = Arc::new(MockHttp::new(Arc::clone(&store)));

    let workspace_config = ClientConfig::new(MOCK_WORKSPACE_KEY)
        .with_base_url(MOCK_BASE_URL)
        .with_retry(fast_retry())
        .with_batch(batch);
    let company_config = ClientConfig::new(MOCK_COMPANY_KEY)
        .with_base_url(MOCK_BASE_URL)
        .with_retry(fast_retry());

    // Both configs are fixed and valid; a failure here is a bug in the fixture.
    let workspace = WorkspaceClient::with_http(workspace_config, http.clone())
        .unwrap_or_else(|e| panic!("mock workspace client: {}", e));
    let company = CompanyClient::with_http(company_config, http.clone())
        .unwrap_or_else(|e| panic!("mock company client: {}", e));

    MockClients {
        workspace,
        company,
        store,
        http,
    }
}
