//! HTTP dispatch transport
//!
//! Implements `DispatchTransport` as one JSON POST per call.

use crate::domain::{RelayerError, RelayerResult};
use crate::ports::outbound::DispatchTransport;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::trace;

/// Header carrying the event key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// POSTs payloads to the destination endpoint.
pub struct HttpDispatchTransport {
    client: Client,
    endpoint: String,
}

impl HttpDispatchTransport {
    /// Create a transport for `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> RelayerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| RelayerError::Config(format!("cannot build dispatch client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Destination endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn user_agent() -> HeaderValue {
    HeaderValue::from_static(concat!("bridge-relayer/", env!("CARGO_PKG_VERSION")))
}

#[async_trait]
impl DispatchTransport for HttpDispatchTransport {
    async fn post(&self, body: Vec<u8>, idempotency_key: &str) -> RelayerResult<u16> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(USER_AGENT, user_agent())
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .body(body)
            .send()
            .await
            .map_err(|e| RelayerError::DispatchRetryable {
                key: idempotency_key.to_string(),
                reason: if e.is_connect() {
                    format!("cannot connect to {}", self.endpoint)
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status().as_u16();
        trace!("[dispatch] {} -> HTTP {}", idempotency_key, status);
        Ok(status)
    }
}
