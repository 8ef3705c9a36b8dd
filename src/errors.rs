use thiserror::Error;

use crate::transport::TransportError;

/// Classified failure of one instrumented call. Parse failures never appear
/// here; they are swallowed and the record's payload stays empty.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        timeout_ms: u64,
        #[source]
        source: Option<TransportError>,
    },

    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: TransportError,
    },
}

impl FetchError {
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms, source: None }
    }

    /// Status label stored on the call record for this failure class.
    pub fn status_text(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "Timeout",
            FetchError::Network { .. } => "Network Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TransportError, TransportErrorKind};

    #[test]
    fn test_timeout_message_names_deadline() {
        let err = FetchError::timeout(50);
        assert!(err.to_string().contains("50"));
        assert_eq!(err.status_text(), "Timeout");
    }

    #[test]
    fn test_network_error_chains_source() {
        let inner = TransportError::new(TransportErrorKind::Connect, "connection refused");
        let err = FetchError::Network {
            message: "connection refused".to_string(),
            source: inner,
        };
        assert_eq!(err.status_text(), "Network Error");
        assert!(std::error::Error::source(&err).is_some());
    }
}
