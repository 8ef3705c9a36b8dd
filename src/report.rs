use chrono::DateTime;
use serde_json::Value;

use crate::errors::FetchError;
use crate::record::CallRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "info" => Severity::Info,
            "warning" => Severity::Warning,
            "critical" => Severity::Critical,
            _ => Severity::Error,
        }
    }
}

/// Display-ready view of a backend error envelope or a local failure.
/// Rendering collaborators consume this as plain data.
#[derive(Clone, Debug)]
pub struct ErrorDisplay {
    pub severity: Severity,
    pub kind: String,
    pub message: String,
    pub suggestion: Option<String>,
    pub remediation: Option<String>,
    pub trace_id: Option<String>,
    /// Epoch seconds as reported by the backend.
    pub timestamp: Option<f64>,
    pub details: Option<Value>,
}

impl ErrorDisplay {
    /// `None` when the value does not carry an error marker.
    pub fn from_envelope(value: &Value) -> Option<Self> {
        let flagged = value.get("error").map_or(false, is_truthy)
            || value.get("error_type").is_some();
        if !flagged {
            return None;
        }
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| value.get("error").and_then(Value::as_str))
            .unwrap_or("Unknown error")
            .to_string();
        Some(Self {
            severity: value
                .get("severity")
                .and_then(Value::as_str)
                .map(Severity::parse)
                .unwrap_or(Severity::Error),
            kind: value
                .get("error_type")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string(),
            message,
            suggestion: value.get("suggestion").and_then(Value::as_str).map(String::from),
            remediation: value.get("remediation").and_then(Value::as_str).map(String::from),
            trace_id: value.get("trace_id").and_then(Value::as_str).map(String::from),
            timestamp: value.get("timestamp").and_then(Value::as_f64),
            details: value.get("details").cloned(),
        })
    }

    pub fn from_failure(err: &FetchError) -> Self {
        let kind = match err {
            FetchError::Timeout { .. } => "timeout",
            FetchError::Network { .. } => "network",
        };
        Self {
            severity: Severity::Error,
            kind: kind.to_string(),
            message: err.to_string(),
            suggestion: None,
            remediation: None,
            trace_id: None,
            timestamp: None,
            details: None,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("[{}] {}", self.severity.as_str(), self.message);
        if let Some(suggestion) = &self.suggestion {
            out.push_str(&format!("\n  suggestion: {}", suggestion));
        }
        if let Some(remediation) = &self.remediation {
            out.push_str(&format!("\n  remediation: {}", remediation));
        }
        if let Some(trace_id) = &self.trace_id {
            out.push_str(&format!("\n  trace: {}", trace_id));
        }
        out
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        _ => true,
    }
}

/// One debug-panel line, already formatted for display.
#[derive(Clone, Debug)]
pub struct PanelRow {
    pub time: String,
    pub method: String,
    pub url: String,
    pub status: String,
    pub latency: String,
    pub hash: String,
    pub trace_id: String,
    pub error: String,
}

pub fn panel_rows(records: &[CallRecord]) -> Vec<PanelRow> {
    records
        .iter()
        .map(|r| PanelRow {
            time: format_time(r.timestamp_ms),
            method: r.method.clone(),
            url: r.url.clone(),
            status: format!("{} {}", r.status, r.status_text).trim().to_string(),
            latency: format!("{}ms", r.latency_ms),
            hash: r.payload_hash.clone().unwrap_or_else(|| "-".to_string()),
            trace_id: r.trace_id.clone().unwrap_or_else(|| "-".to_string()),
            error: r.error.clone().unwrap_or_default(),
        })
        .collect()
}

pub fn render_text(rows: &[PanelRow]) -> String {
    if rows.is_empty() {
        return "no calls recorded".to_string();
    }
    let mut out = String::new();
    for row in rows {
        out.push_str(&format!(
            "{} {:>4} {:<28} {:>12} {:>8} hash={} trace={}",
            row.time, row.method, row.url, row.status, row.latency, row.hash, row.trace_id
        ));
        if !row.error.is_empty() {
            out.push_str(&format!("  !{}", row.error));
        }
        out.push('\n');
    }
    out
}

fn format_time(timestamp_ms: u64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms as i64)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}
