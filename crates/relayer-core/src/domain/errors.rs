//! # Domain Errors
//!
//! Error taxonomy for the relayer. Transient variants are absorbed by the
//! component that produced them; everything else escalates to the
//! coordinator, which either stalls the window or records a dead-letter.

use thiserror::Error;

/// Block height on the source chain.
pub type BlockHeight = u64;

/// Hash type (32-byte word: transaction hashes, topics, bytes32 args).
pub type Hash = [u8; 32];

/// Address type (20-byte).
pub type Address = [u8; 20];

/// Relayer error types.
#[derive(Debug, Error)]
pub enum RelayerError {
    /// Network or timeout failure on a ledger query. Retried.
    #[error("Transient read error in {operation}: {reason}")]
    TransientRead {
        /// Ledger operation that failed.
        operation: String,
        /// Underlying cause.
        reason: String,
    },

    /// Ledger query failed for good (retries exhausted or non-retryable).
    #[error("Fatal read error in {operation} after {attempts} attempt(s): {reason}")]
    FatalRead {
        /// Ledger operation that failed.
        operation: String,
        /// Attempts made before giving up.
        attempts: u32,
        /// Last underlying cause.
        reason: String,
    },

    /// The ledger answered with something we cannot interpret.
    #[error("Invalid ledger response: {0}")]
    InvalidResponse(String),

    /// Log record layout does not match the configured event schema.
    #[error("Malformed event at block {block} tx {tx_id}: {reason}")]
    MalformedEvent {
        /// Block containing the record.
        block: BlockHeight,
        /// Transaction hash, 0x-prefixed.
        tx_id: String,
        /// What did not match.
        reason: String,
    },

    /// Network error or 5xx from the destination. Retried.
    #[error("Retryable dispatch failure for {key}: {reason}")]
    DispatchRetryable {
        /// Event key of the payload.
        key: String,
        /// Underlying cause.
        reason: String,
    },

    /// Destination rejected the payload (4xx).
    #[error("Dispatch rejected for {key} with status {status}: {reason}")]
    DispatchPermanent {
        /// Event key of the payload.
        key: String,
        /// HTTP status returned.
        status: u16,
        /// Response detail.
        reason: String,
    },

    /// Cursor persistence failed.
    #[error("Cursor store error: {0}")]
    CursorStore(String),

    /// Dead-letter sink failed.
    #[error("Dead-letter sink error: {0}")]
    DeadLetterSink(String),

    /// An alert channel could not deliver.
    #[error("Alert channel {channel} failed: {reason}")]
    AlertChannel {
        /// Registered channel name.
        channel: String,
        /// Failure detail.
        reason: String,
    },

    /// Attempted to move the cursor backwards.
    #[error("Cursor regression: current={current}, proposed={proposed}")]
    CursorRegression {
        /// Committed cursor.
        current: BlockHeight,
        /// Proposed new cursor.
        proposed: BlockHeight,
    },

    /// Window would include blocks below the confirmation depth.
    #[error("Unconfirmed window: to_block={to_block}, head={head}, depth={depth}")]
    UnconfirmedWindow {
        /// Proposed upper bound.
        to_block: BlockHeight,
        /// Current head.
        head: BlockHeight,
        /// Required confirmations.
        depth: u64,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayerError {
    /// Whether the read path should retry this error.
    pub fn is_transient_read(&self) -> bool {
        matches!(self, Self::TransientRead { .. })
    }

    /// Whether the dispatch path should retry this error.
    pub fn is_retryable_dispatch(&self) -> bool {
        matches!(self, Self::DispatchRetryable { .. })
    }
}

/// Result type for relayer operations.
pub type RelayerResult<T> = Result<T, RelayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_read_error_message() {
        let err = RelayerError::FatalRead {
            operation: "eth_blockNumber".to_string(),
            attempts: 5,
            reason: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("eth_blockNumber"));
        assert!(msg.contains("5 attempt(s)"));
    }

    #[test]
    fn test_dispatch_permanent_error_message() {
        let err = RelayerError::DispatchPermanent {
            key: "4750150:0xab:0".to_string(),
            status: 422,
            reason: "unknown recipient".to_string(),
        };
        assert!(err.to_string().contains("422"));
    }

    #[test]
    fn test_retry_classification() {
        let read = RelayerError::TransientRead {
            operation: "eth_getLogs".to_string(),
            reason: "timeout".to_string(),
        };
        assert!(read.is_transient_read());
        assert!(!read.is_retryable_dispatch());

        let invalid = RelayerError::InvalidResponse("bad hex".to_string());
        assert!(!invalid.is_transient_read());
    }

    #[test]
    fn test_cursor_regression_message() {
        let err = RelayerError::CursorRegression {
            current: 100,
            proposed: 90,
        };
        assert!(err.to_string().contains("current=100"));
    }
}
