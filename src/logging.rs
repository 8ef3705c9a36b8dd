//! Structured logging for the dashboard diagnostics layer.
//!
//! JSON lines on stdout, one event each: level + domain filtering via
//! `LOG_LEVEL` / `LOG_DOMAINS`, monotonic sequence numbers for ordering,
//! and credential sanitization before anything is written.

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Fetch,    // instrumented call outcomes
    Recorder, // history maintenance
    Poller,   // error-history refresh cycle
    Validate, // client-side form validation
    System,   // startup, shutdown
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Fetch => "fetch",
            Domain::Recorder => "recorder",
            Domain::Poller => "poller",
            Domain::Validate => "validate",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

fn sanitize_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    let redacted = Value::String("[REDACTED]".to_string());
    for key in ["authorization", "Authorization", "api_key", "x-api-key", "signature"] {
        if fields.contains_key(key) {
            fields.insert(key.to_string(), redacted.clone());
        }
    }
    fields
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    let fields = sanitize_fields(fields);
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("data".to_string(), Value::Object(fields));

    println!("{}", Value::Object(entry));
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

pub fn log_fetch_ok(url: &str, method: &str, status: u16, latency_ms: u64, trace_id: Option<&str>) {
    log(
        Level::Debug,
        Domain::Fetch,
        "fetch_ok",
        obj(&[
            ("url", v_str(url)),
            ("method", v_str(method)),
            ("status", json!(status)),
            ("latency_ms", json!(latency_ms)),
            ("trace_id", trace_id.map(v_str).unwrap_or(Value::Null)),
        ]),
    );
}

pub fn log_fetch_fail(url: &str, method: &str, status_text: &str, latency_ms: u64, error: &str) {
    log(
        Level::Warn,
        Domain::Fetch,
        "fetch_fail",
        obj(&[
            ("url", v_str(url)),
            ("method", v_str(method)),
            ("status_text", v_str(status_text)),
            ("latency_ms", json!(latency_ms)),
            ("error", v_str(error)),
        ]),
    );
}

pub fn log_poll(url: &str, ok: bool, detail: &str) {
    log(
        if ok { Level::Debug } else { Level::Warn },
        Domain::Poller,
        "poll_refresh",
        obj(&[
            ("url", v_str(url)),
            ("ok", json!(ok)),
            ("detail", v_str(detail)),
        ]),
    );
}

pub fn log_validation(field: &str, message: &str) {
    log(
        Level::Debug,
        Domain::Validate,
        "field_rejected",
        obj(&[("field", v_str(field)), ("message", v_str(message))]),
    );
}
