//! Request spans - observability sink for the transport (v0.1)
//!
//! Enables dependency injection: [`TracingSink`] in production, [`NoopSink`]
//! or a recording sink in tests.
//!
//! One [`RequestSpan`] covers one logical request (all of its attempts).
//! Every attempt is reported against that span.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Method;

static NEXT_SPAN_ID: AtomicU64 = AtomicU64::new(1);

/// Identity and attributes of one logical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpan {
    pub id: u64,
    pub name: String,
    pub method: Method,
    pub url: String,
}

impl RequestSpan {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            id: NEXT_SPAN_ID.fetch_add(1, Ordering::Relaxed),
            name: format!("http.{}", method.as_str().to_ascii_lowercase()),
            method,
            url: url.into(),
        }
    }
}

/// Result of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Status(u16),
    Error(String),
}

/// Final status of a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanStatus {
    Ok,
    Error(String),
}

/// Trait for recording request spans
///
/// Called synchronously from the transport; implementations must not block.
pub trait SpanSink: Send + Sync {
    fn on_start(&self, span: &RequestSpan);

    /// `attempt` is 1-based.
    fn on_attempt(&self, span: &RequestSpan, attempt: u32, outcome: &AttemptOutcome);

    fn on_end(&self, span: &RequestSpan, status: &SpanStatus, elapsed: Duration);
}

/// Forwards spans to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl SpanSink for TracingSink {
    fn on_start(&self, span: &RequestSpan) {
        tracing::trace!(span_id = span.id, name = %span.name, method = %span.method, url = %span.url, "request started");
    }

    fn on_attempt(&self, span: &RequestSpan, attempt: u32, outcome: &AttemptOutcome) {
        match outcome {
            AttemptOutcome::Status(status) => {
                tracing::debug!(span_id = span.id, attempt, http.status_code = status, url = %span.url, "attempt finished")
            }
            AttemptOutcome::Error(err) => {
                tracing::debug!(span_id = span.id, attempt, error = %err, url = %span.url, "attempt failed")
            }
        }
    }

    fn on_end(&self, span: &RequestSpan, status: &SpanStatus, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match status {
            SpanStatus::Ok => {
                tracing::debug!(span_id = span.id, name = %span.name, elapsed_ms, "request ok")
            }
            SpanStatus::Error(err) => {
                tracing::debug!(span_id = span.id, name = %span.name, elapsed_ms, error = %err, "request failed")
            }
        }
    }
}

/// No-op sink (zero allocation)
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl SpanSink for NoopSink {
    fn on_start(&self, _span: &RequestSpan) {}

    fn on_attempt(&self, _span: &RequestSpan, _attempt: u32, _outcome: &AttemptOutcome) {}

    fn on_end(&self, _span: &RequestSpan, _status: &SpanStatus, _elapsed: Duration) {}
}
