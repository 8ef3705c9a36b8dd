use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub mod http;

/// One HTTP attempt, fully described. The instrumented client builds these;
/// implementations must not retry on their own.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl TransportRequest {
    pub fn get(url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
        }
    }
}

/// Fully buffered response. `Clone` keeps the body readable twice: the
/// instrumented client parses a clone and hands the original to the caller.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, status_text: &str, headers: &[(&str, &str)], body: &[u8]) -> Self {
        Self {
            status,
            status_text: status_text.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
            body: body.to_vec(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    InvalidUrl,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: Box<dyn std::error::Error + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn invalid_url(url: &str, err: url::ParseError) -> Self {
        Self::new(TransportErrorKind::InvalidUrl, format!("invalid url {}: {}", url, err))
            .with_source(Box::new(err))
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

/// Injected HTTP capability: perform one request, return a buffered
/// response or fail. Mock implementations drive the instrumentation tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, req: TransportRequest) -> Result<TransportResponse, TransportError>;
}
