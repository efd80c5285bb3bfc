//! Segment exchange transports.

use crate::serve::serve_segment;
use async_trait::async_trait;
use probpay_core::{
    Orchestrator, SegmentRequest, SegmentResponse, SegmentTransport, TransportError,
    PAYMENT_HEADER, SEGMENT_HEADER, SEGMENT_PATH,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Timeout for the whole exchange, including transcoding time on the
    /// orchestrator.
    pub timeout: Duration,

    /// Accept self-signed orchestrator certificates.
    pub accept_invalid_certs: bool,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            accept_invalid_certs: true,
        }
    }
}

impl HttpTransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

/// Posts segments to `{uri}/segment` over HTTP.
///
/// Any failure before response headers arrive is a
/// [`TransportError::Connect`]; a failure reading the body is a
/// [`TransportError::Response`].
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SegmentTransport for HttpTransport {
    async fn send(&self, request: SegmentRequest) -> Result<SegmentResponse, TransportError> {
        let url = format!("{}{}", request.uri.trim_end_matches('/'), SEGMENT_PATH);
        let duration_ms = (request.duration * 1000.0) as i64;
        trace!(url = %url, bytes = request.data.len(), "Posting segment");

        let resp = self
            .client
            .post(&url)
            .header(SEGMENT_HEADER, request.seg_creds)
            .header(PAYMENT_HEADER, request.payment)
            .header("Content-Type", "video/MP2T")
            .header("Content-Duration", duration_ms.to_string())
            .body(request.data)
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Response(e.to_string()))?;
        Ok(SegmentResponse::new(status, body.to_vec()))
    }
}

/// Hands segments straight to an in-process orchestrator.
pub struct LocalTransport {
    orch: Arc<dyn Orchestrator>,
}

impl LocalTransport {
    pub fn new(orch: Arc<dyn Orchestrator>) -> Self {
        Self { orch }
    }
}

#[async_trait]
impl SegmentTransport for LocalTransport {
    async fn send(&self, request: SegmentRequest) -> Result<SegmentResponse, TransportError> {
        Ok(serve_segment(self.orch.as_ref(), &request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probpay_test_helpers::{keypair, StubOrchestrator};

    #[tokio::test]
    async fn test_connection_refused_is_connect_error() {
        let transport = HttpTransport::new(
            HttpTransportConfig::default().with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        let request = SegmentRequest {
            // Port 1 on loopback is never listening.
            uri: "http://127.0.0.1:1".into(),
            seg_creds: String::new(),
            payment: String::new(),
            data: vec![1, 2, 3],
            duration: 1.0,
        };

        assert!(matches!(
            transport.send(request).await,
            Err(TransportError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_local_transport_serves_in_process() {
        let transport = LocalTransport::new(Arc::new(StubOrchestrator::new(keypair(2))));
        let request = SegmentRequest {
            uri: String::new(),
            seg_creds: "!!".into(),
            payment: String::new(),
            data: vec![],
            duration: 1.0,
        };

        let resp = transport.send(request).await.unwrap();
        assert_eq!(resp.status, 403);
    }
}
