//! HTTP seam: one request in, one response out, no retry logic.
//!
//! [`ReqwestTransport`] is the production implementation. Tests and the
//! `test-fixtures` mock plug in their own [`HttpTransport`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;

use crate::error::{HyreLogError, Result};

/// A fully built request, ready to send.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl TransportRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response. Header names are lower-cased.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Sends a single HTTP request.
///
/// Implementations report connection-level failures (refused, DNS, timeout) as
/// [`HyreLogError::Network`]; any HTTP status, including errors, is a response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;

    /// Release pooled resources. Called once when the owning client closes.
    async fn close(&self) {}
}

/// Default transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HyreLogError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (custom TLS, proxies, connection limits).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let url = request.url.clone();
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| network_error(&url, &e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| network_error(&url, &e))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn network_error(url: &str, err: &reqwest::Error) -> HyreLogError {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    HyreLogError::Network {
        url: url.to_string(),
        reason: format!("{}: {}", kind, err),
    }
}
