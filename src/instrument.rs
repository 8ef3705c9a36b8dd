use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use serde_json::Value;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::errors::FetchError;
use crate::hash::{payload_hash, to_base36};
use crate::logging;
use crate::record::{CallRecord, RecorderHandle};
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// Per-call options. Anything unset falls back to the client defaults.
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    pub method: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub timeout_ms: Option<u64>,
    pub cancel: Option<CancellationToken>,
}

impl FetchOptions {
    pub fn post(body: &str) -> Self {
        Self {
            method: Some("POST".to_string()),
            body: Some(body.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub default_timeout_ms: u64,
    pub trace_header: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            trace_header: "X-Trace-ID".to_string(),
        }
    }
}

impl From<&Config> for ClientConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            default_timeout_ms: cfg.default_timeout_ms,
            trace_header: cfg.trace_header.clone(),
        }
    }
}

/// Which cancellation source fired first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CancelCause {
    Deadline,
    Caller,
}

/// First-of merge over the internal deadline and an optional caller token.
/// Resolves once; asking again returns the stored cause without re-arming
/// the timer. Dropping an unresolved race releases its timer.
pub(crate) struct CancelRace {
    deadline: Duration,
    caller: Option<CancellationToken>,
    fired: Option<CancelCause>,
}

impl CancelRace {
    pub(crate) fn new(deadline: Duration, caller: Option<CancellationToken>) -> Self {
        Self { deadline, caller, fired: None }
    }

    pub(crate) async fn fired(&mut self) -> CancelCause {
        if let Some(cause) = self.fired {
            return cause;
        }
        let cause = match &self.caller {
            Some(token) => tokio::select! {
                _ = sleep(self.deadline) => CancelCause::Deadline,
                _ = token.cancelled() => CancelCause::Caller,
            },
            None => {
                sleep(self.deadline).await;
                CancelCause::Deadline
            }
        };
        self.fired = Some(cause);
        cause
    }
}

fn new_call_id() -> String {
    let ts = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen();
    format!("call-{}-{}", ts, to_base36(suffix))
}

/// Wraps a transport so every call lands in the recorder exactly once, with
/// timing, payload hashing, timeout, and merged cancellation on top of the
/// bare request. The caller sees the same response or a classified failure.
pub struct InstrumentedClient {
    transport: Arc<dyn Transport>,
    recorder: RecorderHandle,
    cfg: ClientConfig,
}

impl InstrumentedClient {
    pub fn new(transport: Arc<dyn Transport>, recorder: RecorderHandle) -> Self {
        Self::with_config(transport, recorder, ClientConfig::default())
    }

    pub fn with_config(
        transport: Arc<dyn Transport>,
        recorder: RecorderHandle,
        cfg: ClientConfig,
    ) -> Self {
        Self { transport, recorder, cfg }
    }

    pub fn recorder(&self) -> &RecorderHandle {
        &self.recorder
    }

    pub async fn execute(
        &self,
        url: &str,
        opts: FetchOptions,
    ) -> Result<TransportResponse, FetchError> {
        let started = Instant::now();
        let call_id = new_call_id();
        let method = opts.method.clone().unwrap_or_else(|| "GET".to_string());
        let body_hash = opts.body.as_deref().map(payload_hash);
        let timeout_ms = opts.timeout_ms.unwrap_or(self.cfg.default_timeout_ms);

        let request = TransportRequest {
            url: url.to_string(),
            method: method.clone(),
            headers: opts.headers.clone(),
            body: opts.body.clone(),
        };

        let mut race = CancelRace::new(Duration::from_millis(timeout_ms), opts.cancel.clone());
        let settled = tokio::select! {
            outcome = self.transport.perform(request) => Some(outcome),
            _ = race.fired() => None,
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match settled {
            Some(Ok(response)) => {
                let payload = parse_json_payload(&response);
                let trace_id = response.header(&self.cfg.trace_header).map(String::from);
                let error = payload_error(&payload);
                let record = CallRecord {
                    id: call_id,
                    url: url.to_string(),
                    method: method.clone(),
                    status: response.status,
                    status_text: response.status_text.clone(),
                    latency_ms,
                    payload_hash: body_hash,
                    payload,
                    timestamp_ms: logging::ts_epoch_ms(),
                    trace_id: trace_id.clone(),
                    error,
                };
                logging::log_fetch_ok(url, &method, response.status, latency_ms, trace_id.as_deref());
                self.recorder.record(record);
                Ok(response)
            }
            Some(Err(transport_err)) => {
                let failure = if transport_err.is_timeout() {
                    FetchError::Timeout {
                        timeout_ms,
                        source: Some(transport_err),
                    }
                } else {
                    FetchError::Network {
                        message: transport_err.to_string(),
                        source: transport_err,
                    }
                };
                self.record_failure(call_id, url, &method, body_hash, latency_ms, &failure);
                Err(failure)
            }
            None => {
                // cancellation won the race; the request future was dropped
                let failure = FetchError::timeout(timeout_ms);
                self.record_failure(call_id, url, &method, body_hash, latency_ms, &failure);
                Err(failure)
            }
        }
    }

    fn record_failure(
        &self,
        call_id: String,
        url: &str,
        method: &str,
        payload_hash: Option<String>,
        latency_ms: u64,
        failure: &FetchError,
    ) {
        let message = failure.to_string();
        let record = CallRecord {
            id: call_id,
            url: url.to_string(),
            method: method.to_string(),
            status: 0,
            status_text: failure.status_text().to_string(),
            latency_ms,
            payload_hash,
            payload: None,
            timestamp_ms: logging::ts_epoch_ms(),
            trace_id: None,
            error: Some(message.clone()),
        };
        logging::log_fetch_fail(url, method, failure.status_text(), latency_ms, &message);
        self.recorder.record(record);
    }
}

fn parse_json_payload(response: &TransportResponse) -> Option<Value> {
    let is_json = response
        .header("content-type")
        .map_or(false, |ct| ct.contains("application/json"));
    if !is_json {
        return None;
    }
    // best effort: a malformed body is not the wrapper's problem
    response.clone().json::<Value>().ok()
}

fn payload_error(payload: &Option<Value>) -> Option<String> {
    payload
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
