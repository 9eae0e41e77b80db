//! Transport core - one logical HTTP call with bounded, policy-driven retry
//!
//! This module provides:
//! - [`retry`]: Retry configuration and backoff schedule
//! - [`http`]: The [`HttpTransport`] seam and its reqwest implementation
//! - [`trace`]: Request spans reported to an injected [`SpanSink`]
//!
//! ## Attempt loop
//!
//! | Outcome | Attempts left | Action |
//! |---------|---------------|--------|
//! | 2xx/3xx | - | parse JSON body, `MalformedResponse` on failure |
//! | 429 + `retry-after` | yes | sleep `retry-after`, schedule unchanged |
//! | retryable status | yes | sleep backoff delay, advance schedule |
//! | network error | yes | sleep backoff delay, advance schedule |
//! | 429 | no | `RateLimited` |
//! | other 4xx/5xx | - | `Api { status_code, body }` |
//! | network error | no | `Network` |

pub mod http;
pub mod retry;
pub mod trace;

pub use http::{HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
pub use retry::{parse_retry_after, Backoff, RetryConfig, DEFAULT_RETRYABLE_STATUS_CODES};
pub use trace::{AttemptOutcome, NoopSink, RequestSpan, SpanSink, SpanStatus, TracingSink};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn, Instrument};

use crate::config::{mask_api_key, ClientConfig};
use crate::error::{excerpt, HyreLogError, Result};

/// Header carrying the workspace or company key.
pub const API_KEY_HEADER: &str = "x-hyrelog-key";

const USER_AGENT: &str = concat!("hyrelog-rust/", env!("CARGO_PKG_VERSION"));

/// Shared by every operation of one client; safe for concurrent requests.
pub struct Transport {
    http: Arc<dyn HttpTransport>,
    sink: Arc<dyn SpanSink>,
    base_url: String,
    api_key: String,
    timeout: Duration,
    debug: bool,
    retry: RetryConfig,
    closed: AtomicBool,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Transport {
    /// Transport over the default reqwest client.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = ReqwestTransport::new(config.timeout)?;
        Self::with_http(config, Arc::new(http))
    }

    /// Transport over a caller-supplied [`HttpTransport`].
    pub fn with_http(config: &ClientConfig, http: Arc<dyn HttpTransport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            http,
            sink: Arc::new(TracingSink),
            base_url: config.normalized_base_url().to_string(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            debug: config.debug,
            retry: config.retry.clone(),
            closed: AtomicBool::new(false),
        })
    }

    /// Replace the observability sink.
    pub fn with_sink(mut self, sink: Arc<dyn SpanSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Perform one logical request and return the parsed JSON body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(String, String)],
    ) -> Result<Value> {
        if self.is_closed() {
            return Err(HyreLogError::ClientClosed);
        }

        let url = self.build_url(path, query)?;
        let span = RequestSpan::new(method.clone(), url.clone());
        let tracing_span = tracing::debug_span!(
            "hyrelog.request",
            span_id = span.id,
            method = %method,
            path = %path
        );

        self.sink.on_start(&span);
        let started = Instant::now();
        let result = self
            .attempt_loop(&span, body)
            .instrument(tracing_span)
            .await;
        let status = match &result {
            Ok(_) => SpanStatus::Ok,
            Err(e) => SpanStatus::Error(e.to_string()),
        };
        self.sink.on_end(&span, &status, started.elapsed());
        result
    }

    async fn attempt_loop(&self, span: &RequestSpan, body: Option<&Value>) -> Result<Value> {
        let request = self.build_request(span, body)?;
        let max_attempts = self.retry.max_attempts();
        let mut backoff = Backoff::new(&self.retry);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let attempts_left = attempt < max_attempts;

            if self.debug {
                debug!(
                    attempt,
                    method = %request.method,
                    url = %request.url,
                    key = %mask_api_key(&self.api_key),
                    body = request.body.as_deref().unwrap_or(""),
                    "HyreLog request"
                );
            }

            let response = match self.http.send(request.clone()).await {
                Ok(response) => response,
                Err(err) => {
                    self.sink
                        .on_attempt(span, attempt, &AttemptOutcome::Error(err.to_string()));
                    if attempts_left {
                        let delay = backoff.next_delay();
                        warn!(
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Retrying after network error"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = response.status;
            self.sink
                .on_attempt(span, attempt, &AttemptOutcome::Status(status));

            if self.debug {
                debug!(
                    attempt,
                    status,
                    body = %excerpt(&response.body),
                    "HyreLog response"
                );
            }

            if status < 400 {
                return serde_json::from_str(&response.body).map_err(|e| {
                    HyreLogError::malformed(format!("invalid JSON: {}", e), &response.body)
                });
            }

            let retry_after = if status == 429 {
                response.header("retry-after").and_then(parse_retry_after)
            } else {
                None
            };

            if attempts_left {
                if let Some(wait) = retry_after {
                    warn!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited, honouring retry-after"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                if self.retry.is_retryable_status(status) {
                    let delay = backoff.next_delay();
                    warn!(
                        attempt,
                        max_attempts,
                        status,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error status"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            return Err(status_error(status, retry_after, &response.body));
        }
    }

    fn build_url(&self, path: &str, query: &[(String, String)]) -> Result<String> {
        let raw = format!("{}{}", self.base_url, path);
        if query.is_empty() {
            return Ok(raw);
        }
        let url = url::Url::parse_with_params(&raw, query)
            .map_err(|e| HyreLogError::config(format!("Invalid request URL '{}': {}", raw, e)))?;
        Ok(url.to_string())
    }

    fn build_request(&self, span: &RequestSpan, body: Option<&Value>) -> Result<TransportRequest> {
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| HyreLogError::validation("body", e.to_string()))?;
        Ok(TransportRequest {
            method: span.method.clone(),
            url: span.url.clone(),
            headers: vec![
                (API_KEY_HEADER.to_string(), self.api_key.clone()),
                ("content-type".to_string(), "application/json".to_string()),
                ("user-agent".to_string(), USER_AGENT.to_string()),
            ],
            body,
            timeout: self.timeout,
        })
    }

    /// Stop accepting requests and release the HTTP layer. Idempotent.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.http.close().await;
            debug!(base_url = %self.base_url, "Transport closed");
        }
    }
}

fn status_error(status: u16, retry_after: Option<Duration>, body: &str) -> HyreLogError {
    if status == 429 {
        HyreLogError::RateLimited {
            retry_after,
            body: excerpt(body),
        }
    } else {
        HyreLogError::Api {
            status_code: status,
            body: excerpt(body),
        }
    }
}
