//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyrelog::transport::{AttemptOutcome, RequestSpan, SpanStatus};
use hyrelog::{
    ClientConfig, HttpTransport, HyreLogError, Result, SpanSink, TransportRequest,
    TransportResponse,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

// =============================================================================
// SCRIPTED HTTP
// =============================================================================

/// Replays a fixed list of outcomes, one per `send`, and records every request.
///
/// Once the script runs out every request gets a 500.
#[derive(Default)]
pub struct ScriptedHttp {
    script: Mutex<VecDeque<Result<TransportResponse>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedHttp {
    pub fn new(script: Vec<Result<TransportResponse>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// `events` array lengths of every recorded batch body, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| r.body.as_deref())
            .filter_map(|b| serde_json::from_str::<Value>(b).ok())
            .filter_map(|v| v["events"].as_array().map(Vec::len))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedHttp {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.requests.lock().push(request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(TransportResponse::new(500, "script exhausted")))
    }
}

pub fn status(code: u16) -> Result<TransportResponse> {
    Ok(TransportResponse::new(code, format!("status {}", code)))
}

pub fn json_ok(body: Value) -> Result<TransportResponse> {
    Ok(TransportResponse::new(200, body.to_string()))
}

pub fn network_error() -> Result<TransportResponse> {
    Err(HyreLogError::Network {
        url: "http://scripted".to_string(),
        reason: "connection failed".to_string(),
    })
}

// =============================================================================
// WIRE FIXTURES
// =============================================================================

pub fn stored_event(id: &str, action: &str) -> Value {
    json!({
        "id": id,
        "companyId": "c1",
        "workspaceId": "w1",
        "action": action,
        "category": "test",
        "hash": format!("hash-{}", id),
        "prevHash": null,
        "traceId": null,
        "createdAt": "2026-01-01T00:00:00.000Z",
        "archived": false,
        "dataRegion": "AU",
    })
}

/// Batch endpoint response echoing `n` stored events.
pub fn batch_response(offset: usize, n: usize) -> Result<TransportResponse> {
    let events: Vec<Value> = (offset..offset + n)
        .map(|i| stored_event(&format!("e{}", i), "test.action"))
        .collect();
    Ok(TransportResponse::new(201, json!({ "events": events }).to_string()))
}

pub fn config() -> ClientConfig {
    ClientConfig::new("test-workspace-key").with_base_url("http://api.test")
}

// =============================================================================
// RECORDING SINK
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SpanRecord {
    Start(u64),
    Attempt(u64, u32, AttemptOutcome),
    End(u64, SpanStatus),
}

#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<SpanRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<SpanRecord> {
        self.records.lock().clone()
    }
}

impl SpanSink for RecordingSink {
    fn on_start(&self, span: &RequestSpan) {
        self.records.lock().push(SpanRecord::Start(span.id));
    }

    fn on_attempt(&self, span: &RequestSpan, attempt: u32, outcome: &AttemptOutcome) {
        self.records
            .lock()
            .push(SpanRecord::Attempt(span.id, attempt, outcome.clone()));
    }

    fn on_end(&self, span: &RequestSpan, status: &SpanStatus, _elapsed: Duration) {
        self.records
            .lock()
            .push(SpanRecord::End(span.id, status.clone()));
    }
}
