//! Retry timing and span reporting for the transport core.
//!
//! Runs on a paused Tokio clock: sleeps complete instantly and advance
//! virtual time by their exact duration, so backoff schedules are checked
//! against wall-clock totals.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{config, json_ok, network_error, status, RecordingSink, ScriptedHttp, SpanRecord};
use hyrelog::transport::{AttemptOutcome, SpanStatus};
use hyrelog::{HyreLogError, RetryConfig, Transport, TransportResponse};
use pretty_assertions::assert_eq;
use reqwest::Method;
use serde_json::json;
use tokio::time::Instant;

fn transport(http: Arc<ScriptedHttp>, retry: RetryConfig) -> Transport {
    Transport::with_http(&config().with_retry(retry), http).unwrap()
}

/// Virtual time is exact up to timer-wheel rounding (1ms per sleep).
#[track_caller]
fn assert_elapsed(started: Instant, expected: Duration) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(20),
        "expected ~{:?}, got {:?}",
        expected,
        elapsed
    );
}

async fn get(transport: &Transport) -> hyrelog::Result<serde_json::Value> {
    transport.request(Method::GET, "/v1/ping", None, &[]).await
}

// =============================================================================
// BACKOFF SCHEDULE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_two_503s_then_success_waits_one_plus_two_seconds() {
    let http = ScriptedHttp::new(vec![status(503), status(503), json_ok(json!({"ok": true}))]);
    let transport = transport(http.clone(), RetryConfig::default());

    let started = Instant::now();
    let value = get(&transport).await.unwrap();

    assert_eq!(value, json!({"ok": true}));
    assert_eq!(http.request_count(), 3);
    assert_elapsed(started, Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_delay_is_capped_at_max_delay() {
    let http = ScriptedHttp::new(vec![
        status(502),
        status(502),
        status(502),
        json_ok(json!({})),
    ]);
    let retry = RetryConfig::default()
        .with_multiplier(10.0)
        .with_max_delay(Duration::from_secs(3));
    let transport = transport(http.clone(), retry);

    let started = Instant::now();
    get(&transport).await.unwrap();

    // 1s, then min(10s, 3s), then 3s again
    assert_elapsed(started, Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_network_errors_exhaust_all_attempts() {
    let http = ScriptedHttp::new(vec![
        network_error(),
        network_error(),
        network_error(),
        network_error(),
    ]);
    let transport = transport(http.clone(), RetryConfig::default());

    let started = Instant::now();
    let err = get(&transport).await.unwrap_err();

    assert!(matches!(err, HyreLogError::Network { .. }));
    assert_eq!(http.request_count(), 4);
    assert_elapsed(started, Duration::from_secs(1 + 2 + 4));
}

#[tokio::test(start_paused = true)]
async fn test_huge_multiplier_saturates_at_max_delay() {
    let http = ScriptedHttp::new(vec![
        status(503),
        status(503),
        status(503),
        json_ok(json!({})),
    ]);
    let transport = transport(http.clone(), RetryConfig::default().with_multiplier(1e20));

    let started = Instant::now();
    get(&transport).await.unwrap();

    // 1s, then the 10s cap twice
    assert_elapsed(started, Duration::from_secs(21));
    assert_eq!(http.request_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retryable_status_is_api_error_with_last_status() {
    let http = ScriptedHttp::new(vec![status(500), status(504)]);
    let transport = transport(http.clone(), RetryConfig::default().with_max_retries(1));

    let err = get(&transport).await.unwrap_err();

    assert_eq!(err.status_code(), Some(504));
    assert_eq!(http.request_count(), 2);
}

// =============================================================================
// RATE LIMITING
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_after_overrides_backoff() {
    let http = ScriptedHttp::new(vec![
        Ok(TransportResponse::new(429, "slow down").with_header("Retry-After", "2")),
        json_ok(json!({})),
    ]);
    let retry = RetryConfig::default()
        .with_initial_delay(Duration::from_secs(5))
        .with_max_delay(Duration::from_secs(10));
    let transport = transport(http.clone(), retry);

    let started = Instant::now();
    get(&transport).await.unwrap();

    assert_elapsed(started, Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_does_not_advance_backoff() {
    let http = ScriptedHttp::new(vec![
        Ok(TransportResponse::new(429, "").with_header("retry-after", "1")),
        status(503),
        json_ok(json!({})),
    ]);
    let transport = transport(http.clone(), RetryConfig::default());

    let started = Instant::now();
    get(&transport).await.unwrap();

    // retry-after 1s, then the first backoff step (1s), not the second (2s)
    assert_elapsed(started, Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_unrepresentable_retry_after_falls_back_to_backoff() {
    let http = ScriptedHttp::new(vec![
        Ok(TransportResponse::new(429, "").with_header("retry-after", "99999999999999999999")),
        json_ok(json!({})),
    ]);
    let transport = transport(http.clone(), RetryConfig::default());

    let started = Instant::now();
    get(&transport).await.unwrap();

    assert_elapsed(started, Duration::from_secs(1));
    assert_eq!(http.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_429_without_retry_after_uses_backoff() {
    let http = ScriptedHttp::new(vec![status(429), json_ok(json!({}))]);
    let transport = transport(http.clone(), RetryConfig::default());

    let started = Instant::now();
    get(&transport).await.unwrap();

    assert_elapsed(started, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_terminal_429_reports_retry_after() {
    let http = ScriptedHttp::new(vec![Ok(
        TransportResponse::new(429, "quota").with_header("retry-after", "30")
    )]);
    let transport = transport(http.clone(), RetryConfig::disabled());

    let err = get(&transport).await.unwrap_err();

    match err {
        HyreLogError::RateLimited { retry_after, .. } => {
            assert_eq!(retry_after, Some(Duration::from_secs(30)));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
    assert_eq!(http.request_count(), 1);
}

// =============================================================================
// SPANS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_one_span_per_logical_request_with_each_attempt() {
    let http = ScriptedHttp::new(vec![status(503), json_ok(json!({}))]);
    let sink = Arc::new(RecordingSink::default());
    let transport = transport(http, RetryConfig::default()).with_sink(sink.clone());

    get(&transport).await.unwrap();

    let records = sink.records();
    let id = match records.first() {
        Some(SpanRecord::Start(id)) => *id,
        other => panic!("expected span start, got {:?}", other),
    };
    assert_eq!(
        records,
        vec![
            SpanRecord::Start(id),
            SpanRecord::Attempt(id, 1, AttemptOutcome::Status(503)),
            SpanRecord::Attempt(id, 2, AttemptOutcome::Status(200)),
            SpanRecord::End(id, SpanStatus::Ok),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_request_ends_span_with_error() {
    let http = ScriptedHttp::new(vec![network_error()]);
    let sink = Arc::new(RecordingSink::default());
    let transport = transport(http, RetryConfig::disabled()).with_sink(sink.clone());

    get(&transport).await.unwrap_err();

    let records = sink.records();
    assert_eq!(records.len(), 3);
    assert!(matches!(
        &records[1],
        SpanRecord::Attempt(_, 1, AttemptOutcome::Error(_))
    ));
    assert!(matches!(&records[2], SpanRecord::End(_, SpanStatus::Error(_))));
}
