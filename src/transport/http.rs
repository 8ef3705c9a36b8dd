use async_trait::async_trait;
use reqwest::{Client, Method};
use url::Url;

use super::{Transport, TransportError, TransportErrorKind, TransportRequest, TransportResponse};

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn map_reqwest(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Request
    };
    TransportError::new(kind, err.to_string()).with_source(Box::new(err))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(&self, req: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = Url::parse(&req.url).map_err(|e| TransportError::invalid_url(&req.url, e))?;
        let method = Method::from_bytes(req.method.as_bytes()).unwrap_or(Method::GET);

        let mut builder = self.client.request(method, url);
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await.map_err(map_reqwest)?;
        let status = resp.status().as_u16();
        let status_text = resp.status().canonical_reason().unwrap_or("").to_string();
        let mut headers = std::collections::HashMap::new();
        for (name, value) in resp.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
        }
        let body = resp.bytes().await.map_err(map_reqwest)?.to_vec();

        let header_pairs: Vec<(&str, &str)> = headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        Ok(TransportResponse::new(status, &status_text, &header_pairs, &body))
    }
}
