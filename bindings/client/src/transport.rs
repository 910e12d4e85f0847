use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// A JSON POST to the control plane.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRequest {
    pub url: String,
    /// Sent as the `X-Locust-Token` header.
    pub token: String,
    pub body: serde_json::Value,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends JSON to the control plane and reports the response status.
///
/// The client does not retry, so implementations should make a single attempt and return.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn post_json(&self, request: PostRequest) -> Result<TransportResponse, TransportError>;
}

/// [Transport] over HTTP using reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, request: PostRequest) -> Result<TransportResponse, TransportError> {
        let timeout = request.timeout;

        let response = self
            .client
            .post(&request.url)
            .header(crate::client::TOKEN_HEADER, &request.token)
            .json(&request.body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;

        Ok(TransportResponse { status, body })
    }
}
