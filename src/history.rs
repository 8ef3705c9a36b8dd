use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::instrument::{FetchOptions, InstrumentedClient};
use crate::logging;

/// Status payload from the backend. Unknown fields are tolerated so the
/// backend can grow its envelope without breaking older dashboards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusEnvelope {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub errors: Option<ErrorReport>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(default)]
    pub global_alert: Option<Alert>,
    #[serde(default)]
    pub global_error_history: Vec<ErrorEntry>,
    #[serde(default)]
    pub instance_errors: HashMap<String, InstanceErrors>,
}

impl ErrorReport {
    pub fn is_empty(&self) -> bool {
        self.global_alert.is_none()
            && self.global_error_history.is_empty()
            && self.instance_errors.values().all(|inst| {
                inst.alert.is_none() && inst.error_history.is_empty()
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Epoch seconds as reported by the backend.
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceErrors {
    #[serde(default)]
    pub alert: Option<Alert>,
    #[serde(default)]
    pub error_history: Vec<ErrorEntry>,
}

/// What the display layer gets on each look.
#[derive(Debug, Clone, Default)]
pub struct ErrorHistoryView {
    pub report: Option<ErrorReport>,
    pub last_failure: Option<String>,
    pub refreshed_at_ms: Option<u64>,
    pub paused: bool,
}

#[derive(Default)]
struct PollState {
    report: Option<ErrorReport>,
    last_failure: Option<String>,
    refreshed_at_ms: Option<u64>,
}

/// Periodically pulls the backend status endpoint through the instrumented
/// client and keeps the latest error report. A failed refresh keeps the
/// previous report; only the failure note changes.
pub struct ErrorHistoryPoller {
    client: Arc<InstrumentedClient>,
    status_url: String,
    interval: Duration,
    max_display: usize,
    paused: AtomicBool,
    state: Mutex<PollState>,
}

impl ErrorHistoryPoller {
    pub fn new(
        client: Arc<InstrumentedClient>,
        status_url: impl Into<String>,
        interval: Duration,
        max_display: usize,
    ) -> Self {
        Self {
            client,
            status_url: status_url.into(),
            interval,
            max_display,
            paused: AtomicBool::new(false),
            state: Mutex::new(PollState::default()),
        }
    }

    pub async fn refresh(&self) {
        match self.fetch_report().await {
            Ok(report) => {
                logging::log_poll(&self.status_url, true, "refreshed");
                let mut state = self.lock_state();
                state.report = Some(report);
                state.last_failure = None;
                state.refreshed_at_ms = Some(logging::ts_epoch_ms());
            }
            Err(err) => {
                logging::log_poll(&self.status_url, false, &err.to_string());
                let mut state = self.lock_state();
                state.last_failure = Some(err.to_string());
            }
        }
    }

    async fn fetch_report(&self) -> Result<ErrorReport> {
        let response = self
            .client
            .execute(&self.status_url, FetchOptions::default())
            .await?;
        let envelope: StatusEnvelope = response.json()?;
        if envelope.error.is_some() || !envelope.ok {
            bail!("status endpoint reported failure");
        }
        Ok(envelope.errors.unwrap_or_default())
    }

    pub fn snapshot(&self) -> ErrorHistoryView {
        let state = self.lock_state();
        let report = state.report.clone().map(|mut r| {
            truncate_report(&mut r, self.max_display);
            r
        });
        ErrorHistoryView {
            report,
            last_failure: state.last_failure.clone(),
            refreshed_at_ms: state.refreshed_at_ms,
            paused: self.is_paused(),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Returns the new paused state.
    pub fn toggle(&self) -> bool {
        self.paused.fetch_xor(true, Ordering::SeqCst) ^ true
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Refresh loop; first tick fires immediately. Exits on cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !self.is_paused() {
                        self.refresh().await;
                    }
                }
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PollState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn truncate_report(report: &mut ErrorReport, max_display: usize) {
    report.global_error_history.truncate(max_display);
    for inst in report.instance_errors.values_mut() {
        inst.error_history.truncate(max_display);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecorderHandle;
    use crate::transport::{
        Transport, TransportError, TransportErrorKind, TransportRequest, TransportResponse,
    };
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_parse_full_envelope() {
        let raw = r#"{
            "ok": true,
            "uptime_secs": 1234,
            "errors": {
                "global_alert": {"type": "warning", "message": "feed lag", "suggestion": "check feed"},
                "global_error_history": [
                    {"timestamp": 1700000000.5, "type": "network", "message": "connect refused",
                     "symbol": "BTC/USDT", "trace_id": "t-1", "details": {"attempt": 2}},
                    {"message": "bare entry"}
                ],
                "instance_errors": {
                    "mom-0": {
                        "alert": {"type": "error", "message": "halted"},
                        "error_history": [{"type": "order", "message": "rejected"}]
                    }
                }
            }
        }"#;
        let envelope: StatusEnvelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.ok);
        let report = envelope.errors.unwrap();
        assert_eq!(report.global_alert.as_ref().unwrap().kind, "warning");
        assert_eq!(report.global_error_history.len(), 2);
        assert_eq!(report.global_error_history[0].trace_id.as_deref(), Some("t-1"));
        assert_eq!(report.global_error_history[1].message, "bare entry");
        let inst = &report.instance_errors["mom-0"];
        assert_eq!(inst.alert.as_ref().unwrap().message, "halted");
        assert_eq!(inst.error_history.len(), 1);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_parse_minimal_envelope() {
        let envelope: StatusEnvelope = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(envelope.ok);
        assert!(envelope.errors.unwrap_or_default().is_empty());
    }

    #[test]
    fn test_truncate_report_caps_all_histories() {
        let mut report = ErrorReport::default();
        for n in 0..30 {
            report.global_error_history.push(ErrorEntry {
                timestamp: None,
                kind: None,
                message: format!("e{}", n),
                symbol: None,
                trace_id: None,
                details: None,
            });
        }
        report.instance_errors.insert(
            "mom-0".to_string(),
            InstanceErrors {
                alert: None,
                error_history: report.global_error_history.clone(),
            },
        );
        truncate_report(&mut report, 20);
        assert_eq!(report.global_error_history.len(), 20);
        assert_eq!(report.instance_errors["mom-0"].error_history.len(), 20);
        // newest entries kept from the front
        assert_eq!(report.global_error_history[0].message, "e0");
    }

    struct FlakyStatus {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FlakyStatus {
        async fn perform(&self, _req: TransportRequest) -> Result<TransportResponse, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Ok(TransportResponse::new(
                    200,
                    "OK",
                    &[("content-type", "application/json")],
                    br#"{"ok": true, "errors": {"global_error_history": [{"message": "first"}]}}"#,
                ))
            } else {
                Err(TransportError::new(TransportErrorKind::Connect, "connection refused"))
            }
        }
    }

    fn make_poller(transport: Arc<dyn Transport>) -> ErrorHistoryPoller {
        let recorder = RecorderHandle::new(10);
        let client = Arc::new(InstrumentedClient::new(transport, recorder));
        ErrorHistoryPoller::new(client, "http://backend/api/status", Duration::from_secs(5), 20)
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_report() {
        let poller = make_poller(Arc::new(FlakyStatus { calls: AtomicUsize::new(0) }));

        poller.refresh().await;
        let view = poller.snapshot();
        assert!(view.last_failure.is_none());
        assert_eq!(
            view.report.as_ref().unwrap().global_error_history[0].message,
            "first"
        );

        poller.refresh().await;
        let view = poller.snapshot();
        // previous report survives, failure is noted
        assert!(view.last_failure.is_some());
        assert_eq!(
            view.report.as_ref().unwrap().global_error_history[0].message,
            "first"
        );
    }

    #[test]
    fn test_pause_resume_toggle() {
        let poller = make_poller(Arc::new(FlakyStatus { calls: AtomicUsize::new(0) }));
        assert!(!poller.is_paused());
        poller.pause();
        assert!(poller.is_paused());
        poller.resume();
        assert!(!poller.is_paused());
        assert!(poller.toggle());
        assert!(poller.is_paused());
        assert!(!poller.toggle());
        assert!(!poller.is_paused());
    }
}
