//! End-to-end checks of the instrumented client against mock transports:
//! one record per call on every settlement path, transparent responses,
//! and the timeout/cancellation race.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use apiwatch::errors::FetchError;
use apiwatch::hash::payload_hash;
use apiwatch::instrument::{FetchOptions, InstrumentedClient};
use apiwatch::record::{RecordFilter, RecorderHandle};
use apiwatch::transport::{
    Transport, TransportError, TransportErrorKind, TransportRequest, TransportResponse,
};

struct JsonResponder {
    delay: Duration,
}

#[async_trait]
impl Transport for JsonResponder {
    async fn perform(&self, _req: TransportRequest) -> Result<TransportResponse, TransportError> {
        tokio::time::sleep(self.delay).await;
        Ok(TransportResponse::new(
            200,
            "OK",
            &[("content-type", "application/json"), ("x-trace-id", "trace-42")],
            br#"{"ok":true}"#,
        ))
    }
}

struct NeverSettles;

#[async_trait]
impl Transport for NeverSettles {
    async fn perform(&self, _req: TransportRequest) -> Result<TransportResponse, TransportError> {
        std::future::pending().await
    }
}

struct RefusesConnection;

#[async_trait]
impl Transport for RefusesConnection {
    async fn perform(&self, _req: TransportRequest) -> Result<TransportResponse, TransportError> {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        Err(TransportError::new(TransportErrorKind::Connect, "connection refused")
            .with_source(Box::new(io)))
    }
}

fn make_client(transport: Arc<dyn Transport>) -> (InstrumentedClient, RecorderHandle) {
    let recorder = RecorderHandle::new(10);
    (InstrumentedClient::new(transport, recorder.clone()), recorder)
}

#[tokio::test]
async fn post_success_records_full_metadata() {
    let (client, recorder) = make_client(Arc::new(JsonResponder {
        delay: Duration::from_millis(10),
    }));
    let body = r#"{"a":1}"#;

    let response = client.execute("/api/x", FetchOptions::post(body)).await.unwrap();
    assert_eq!(response.status, 200);

    let records = recorder.query(&RecordFilter::default());
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.url, "/api/x");
    assert_eq!(r.method, "POST");
    assert_eq!(r.status, 200);
    assert_eq!(r.status_text, "OK");
    assert_eq!(r.payload, Some(json!({"ok": true})));
    assert_eq!(r.payload_hash, Some(payload_hash(body)));
    assert!(r.latency_ms >= 10, "latency {} too small", r.latency_ms);
    assert!(r.latency_ms < 2_000, "latency {} too large", r.latency_ms);
    assert_eq!(r.trace_id.as_deref(), Some("trace-42"));
    assert!(r.error.is_none());
}

#[tokio::test]
async fn response_body_stays_readable_by_caller() {
    let (client, _recorder) = make_client(Arc::new(JsonResponder {
        delay: Duration::from_millis(1),
    }));
    let response = client.execute("/api/x", FetchOptions::default()).await.unwrap();
    // the wrapper parsed a clone, not the caller's copy
    let parsed: Value = response.json().unwrap();
    assert_eq!(parsed, json!({"ok": true}));
}

#[tokio::test]
async fn get_is_the_default_method_and_skips_body_hash() {
    let (client, recorder) = make_client(Arc::new(JsonResponder {
        delay: Duration::from_millis(1),
    }));
    client.execute("/api/status", FetchOptions::default()).await.unwrap();
    let r = &recorder.query(&RecordFilter::default())[0];
    assert_eq!(r.method, "GET");
    assert!(r.payload_hash.is_none());
}

#[tokio::test]
async fn timeout_produces_one_record_and_named_deadline() {
    let (client, recorder) = make_client(Arc::new(NeverSettles));
    let started = Instant::now();

    let err = client
        .execute(
            "/api/x",
            FetchOptions {
                method: Some("POST".to_string()),
                body: Some(r#"{"a":1}"#.to_string()),
                timeout_ms: Some(50),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    match &err {
        FetchError::Timeout { timeout_ms, .. } => assert_eq!(*timeout_ms, 50),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(err.to_string().contains("50"));

    let records = recorder.query(&RecordFilter::default());
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.status, 0);
    assert_eq!(r.status_text, "Timeout");
    assert!(r.latency_ms >= 40, "settled before the deadline: {}ms", r.latency_ms);
    assert!(r.error.as_deref().unwrap_or("").contains("50"));
    // body hash still derived for failed sends
    assert_eq!(r.payload_hash, Some(payload_hash(r#"{"a":1}"#)));
}

#[tokio::test]
async fn caller_cancellation_settles_once_before_deadline() {
    let (client, recorder) = make_client(Arc::new(NeverSettles));
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = client
        .execute(
            "/api/x",
            FetchOptions {
                cancel: Some(token),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    // far below the 30s default deadline: the caller token won the race
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(matches!(err, FetchError::Timeout { .. }));

    let records = recorder.query(&RecordFilter::default());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, 0);
    assert_eq!(records[0].status_text, "Timeout");
}

#[tokio::test]
async fn network_failure_is_classified_and_chained() {
    let (client, recorder) = make_client(Arc::new(RefusesConnection));

    let err = client.execute("/api/x", FetchOptions::default()).await.unwrap_err();
    match &err {
        FetchError::Network { message, .. } => assert!(message.contains("connection refused")),
        other => panic!("expected network error, got {:?}", other),
    }
    assert!(std::error::Error::source(&err).is_some());

    let records = recorder.query(&RecordFilter::default());
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.status, 0);
    assert_eq!(r.status_text, "Network Error");
    assert!(r.error.is_some());
}

#[tokio::test]
async fn each_call_lands_exactly_one_record() {
    let (client, recorder) = make_client(Arc::new(JsonResponder {
        delay: Duration::from_millis(1),
    }));
    client.execute("/api/a", FetchOptions::default()).await.unwrap();
    client.execute("/api/b", FetchOptions::default()).await.unwrap();
    client.execute("/api/c", FetchOptions::default()).await.unwrap();

    let records = recorder.query(&RecordFilter::default());
    assert_eq!(records.len(), 3);
    // newest first
    let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["/api/c", "/api/b", "/api/a"]);
}

#[tokio::test]
async fn failed_calls_show_up_in_errors_only_queries() {
    let (client, recorder) = make_client(Arc::new(RefusesConnection));
    let _ = client.execute("/api/orders", FetchOptions::default()).await;

    let errs = recorder.query(&RecordFilter { errors_only: true, ..Default::default() });
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].url, "/api/orders");
}
