use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderValue};
use tracing::{debug, instrument};

use super::{SourceError, StatusSource};
use crate::types::{StatusRequest, StatusResponse};

/// Polls a JSON status endpoint over HTTP.
///
/// Request: `GET <endpoint>?now=<rfc3339>&categories=a,b&since.<category>=<watermark>`.
/// Response: `{"updates": {...}, "watermarks": {...}}`, both keys optional.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SourceError> {
        let url = reqwest::Url::parse(endpoint).map_err(|e| SourceError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SourceError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Connection(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            endpoint: url,
        })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

/// Query parameters carrying the request's time, categories and watermarks.
fn query_pairs(request: &StatusRequest) -> Vec<(String, String)> {
    let categories = request
        .categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let mut pairs = vec![
        ("now".to_string(), request.now.to_rfc3339()),
        ("categories".to_string(), categories),
    ];
    pairs.extend(
        request
            .watermarks
            .iter()
            .map(|(category, watermark)| (format!("since.{category}"), watermark.to_string())),
    );
    pairs
}

#[async_trait]
impl StatusSource for HttpSource {
    #[instrument(name = "http_source_fetch", skip_all, fields(endpoint = %self.endpoint))]
    async fn fetch(&self, request: &StatusRequest) -> Result<StatusResponse, SourceError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&query_pairs(request))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout
                } else {
                    SourceError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Connection(format!("read body failed: {e}"))
            }
        })?;

        debug!(event = "core.source.response_received", bytes = bytes.len());

        serde_json::from_slice::<StatusResponse>(&bytes)
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))
    }
}
