#[derive(Clone, Debug)]
pub struct Config {
    pub recorder_capacity: usize,
    pub default_timeout_ms: u64,
    pub trace_header: String,
    pub status_url: String,
    pub poll_interval_secs: u64,
    pub max_display_errors: usize,
    pub kill_file: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            recorder_capacity: std::env::var("RECORDER_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(50),
            default_timeout_ms: std::env::var("FETCH_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(30_000),
            trace_header: std::env::var("TRACE_HEADER").unwrap_or_else(|_| "X-Trace-ID".to_string()),
            status_url: std::env::var("STATUS_URL").unwrap_or_else(|_| "http://127.0.0.1:8080/api/status".to_string()),
            poll_interval_secs: std::env::var("POLL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            max_display_errors: std::env::var("MAX_DISPLAY_ERRORS").ok().and_then(|v| v.parse().ok()).unwrap_or(20),
            kill_file: std::env::var("KILL_FILE").unwrap_or_else(|_| "/tmp/STOP".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recorder_capacity: 50,
            default_timeout_ms: 30_000,
            trace_header: "X-Trace-ID".to_string(),
            status_url: "http://127.0.0.1:8080/api/status".to_string(),
            poll_interval_secs: 5,
            max_display_errors: 20,
            kill_file: "/tmp/STOP".to_string(),
        }
    }
}
