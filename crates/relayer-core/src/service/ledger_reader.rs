//! Read path: height and log queries with per-attempt timeout and retry.

use crate::algorithms::{retry_with_backoff, RetryFailure};
use crate::domain::{
    Address, BackoffPolicy, BlockHeight, Hash, RawLogRecord, RelayerError, RelayerResult,
    ScanWindow,
};
use crate::ports::outbound::{LedgerClient, LogFilter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retrying wrapper around a [`LedgerClient`].
///
/// Holds no state between calls.
pub struct LedgerReader<L: LedgerClient> {
    client: Arc<L>,
    policy: BackoffPolicy,
    rpc_timeout: Duration,
}

impl<L: LedgerClient> LedgerReader<L> {
    /// Create a reader.
    pub fn new(client: Arc<L>, policy: BackoffPolicy, rpc_timeout: Duration) -> Self {
        Self {
            client,
            policy,
            rpc_timeout,
        }
    }

    /// Current head height.
    ///
    /// # Errors
    ///
    /// `FatalRead` once the retry budget is spent or the node returns
    /// something unparseable.
    pub async fn current_height(&self) -> RelayerResult<BlockHeight> {
        let client = &self.client;
        let height = self
            .with_retry("eth_blockNumber", || client.block_number())
            .await?;
        debug!("[ledger] head height {}", height);
        Ok(height)
    }

    /// Logs in `window`, ascending by (block, transaction index, log index).
    ///
    /// Records the node flags as removed, or places outside the window, are
    /// dropped.
    pub async fn logs_in_range(
        &self,
        window: ScanWindow,
        address: Address,
        topic0: Hash,
    ) -> RelayerResult<Vec<RawLogRecord>> {
        let filter = LogFilter {
            from_block: window.first_block(),
            to_block: window.to_block,
            address,
            topic0,
        };
        let client = &self.client;
        let filter_ref = &filter;
        let mut records = self
            .with_retry("eth_getLogs", || client.get_logs(filter_ref))
            .await?;

        records.retain(|record| {
            if record.removed {
                warn!(
                    "[ledger] dropping removed log {} in block {}",
                    record.key(),
                    record.block_number
                );
                return false;
            }
            if !window.contains(record.block_number) {
                warn!(
                    "[ledger] dropping log {} from block {} outside window {}",
                    record.key(),
                    record.block_number,
                    window
                );
                return false;
            }
            true
        });
        // Stable: equal keys keep the node's order
        records.sort_by_key(RawLogRecord::ordering_key);

        debug!(
            "[ledger] {} log(s) across {} block(s) of window {}",
            records.len(),
            window.block_count(),
            window
        );
        Ok(records)
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> RelayerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RelayerResult<T>>,
    {
        let timeout = self.rpc_timeout;
        let label = format!("[ledger] {}", operation);

        let attempt = || {
            let fut = call();
            async move {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(RelayerError::TransientRead {
                        operation: operation.to_string(),
                        reason: format!("timed out after {:?}", timeout),
                    }),
                }
            }
        };

        match retry_with_backoff(&self.policy, &label, attempt, RelayerError::is_transient_read)
            .await
        {
            Ok((value, _attempts)) => Ok(value),
            Err(failure) => {
                let attempts = failure.attempts();
                let reason = match failure {
                    RetryFailure::Exhausted { last_error, .. } => last_error.to_string(),
                    RetryFailure::Aborted { error, .. } => error.to_string(),
                };
                Err(RelayerError::FatalRead {
                    operation: operation.to_string(),
                    attempts,
                    reason,
                })
            }
        }
    }
}
