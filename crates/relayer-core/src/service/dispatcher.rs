//! Write path: canonical payload, one POST per attempt, bounded retry.

use crate::algorithms::{retry_with_backoff, DispatchPayload, RetryFailure};
use crate::domain::{BackoffPolicy, BridgeEvent, DispatchOutcome, RelayerError, RelayerResult};
use crate::ports::outbound::DispatchTransport;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Delivers [`BridgeEvent`]s to the destination.
pub struct Dispatcher<T: DispatchTransport> {
    transport: Arc<T>,
    policy: BackoffPolicy,
    timeout: Duration,
    event_type: String,
}

impl<T: DispatchTransport> Dispatcher<T> {
    /// Create a dispatcher.
    pub fn new(
        transport: Arc<T>,
        policy: BackoffPolicy,
        timeout: Duration,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            policy,
            timeout,
            event_type: event_type.into(),
        }
    }

    /// Dispatch one event.
    ///
    /// 2xx is delivered; network errors, timeouts and 5xx are retried and
    /// end as `RetryableFailure`; any other status is `PermanentFailure`.
    pub async fn dispatch(&self, event: &BridgeEvent) -> DispatchOutcome {
        let payload = DispatchPayload::from_event(event, &self.event_type);
        let key = payload.idempotency_key.clone();

        let body = match payload.to_bytes() {
            Ok(body) => body,
            Err(e) => {
                return DispatchOutcome::PermanentFailure {
                    status: 0,
                    reason: e.to_string(),
                }
            }
        };

        let label = format!("[dispatch] {}", key);
        let result = retry_with_backoff(
            &self.policy,
            &label,
            || self.attempt(body.clone(), &key),
            RelayerError::is_retryable_dispatch,
        )
        .await;

        match result {
            Ok(((), attempts)) => {
                debug!("[dispatch] {} delivered after {} attempt(s)", key, attempts);
                DispatchOutcome::Delivered { attempts }
            }
            Err(RetryFailure::Aborted {
                error: RelayerError::DispatchPermanent { status, reason, .. },
                ..
            }) => {
                warn!("[dispatch] {} rejected with status {}", key, status);
                DispatchOutcome::PermanentFailure { status, reason }
            }
            Err(failure) => {
                let attempts = failure.attempts();
                let reason = failure.into_error().to_string();
                warn!(
                    "[dispatch] {} still failing after {} attempt(s): {}",
                    key, attempts, reason
                );
                DispatchOutcome::RetryableFailure { attempts, reason }
            }
        }
    }

    async fn attempt(&self, body: Vec<u8>, key: &str) -> RelayerResult<()> {
        let status = match tokio::time::timeout(self.timeout, self.transport.post(body, key)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(RelayerError::DispatchRetryable {
                    key: key.to_string(),
                    reason: format!("timed out after {:?}", self.timeout),
                })
            }
        };

        match status {
            200..=299 => Ok(()),
            500..=599 => Err(RelayerError::DispatchRetryable {
                key: key.to_string(),
                reason: format!("destination returned {}", status),
            }),
            _ => Err(RelayerError::DispatchPermanent {
                key: key.to_string(),
                status,
                reason: format!("destination returned {}", status),
            }),
        }
    }
}
