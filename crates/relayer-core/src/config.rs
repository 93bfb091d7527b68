//! Relayer configuration.
//!
//! One immutable value, built once at startup and handed to each component.

use crate::domain::{
    invariant_confirmation_depth, Address, BackoffPolicy, EventSchema, RelayerError,
    RelayerResult,
};
use std::time::Duration;

/// Complete relayer configuration.
#[derive(Debug, Clone)]
pub struct RelayerConfig {
    /// Source chain JSON-RPC endpoint.
    pub source_endpoint: String,
    /// Bridge contract emitting the event.
    pub contract_address: Address,
    /// Watched event.
    pub event_schema: EventSchema,
    /// Destination endpoint receiving payloads.
    pub destination_endpoint: String,
    /// Blocks a log must be buried under before it is relayed.
    pub confirmation_depth: u64,
    /// Sleep between cycles when there is nothing new.
    pub poll_interval: Duration,
    /// First run only: start this many blocks behind the head.
    pub start_offset: u64,
    /// Upper bound on blocks per log query.
    pub max_blocks_per_window: u64,
    /// Concurrent dispatches within one window.
    pub max_concurrent_dispatches: usize,
    /// Retry policy for ledger reads and dispatches.
    pub retry: BackoffPolicy,
    /// Failed cycles tolerated after the first before the loop faults.
    pub max_cycle_retries: u32,
    /// Per-attempt timeout for ledger calls.
    pub rpc_timeout: Duration,
    /// Per-attempt timeout for dispatch calls.
    pub dispatch_timeout: Duration,
    /// `eventType` field of every payload.
    pub event_type: String,
}

impl RelayerConfig {
    /// Default poll interval (15 seconds).
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

    /// Default confirmation depth.
    pub const DEFAULT_CONFIRMATION_DEPTH: u64 = 6;

    /// Default fallback offset behind head on first run.
    pub const DEFAULT_START_OFFSET: u64 = 100;

    /// Default maximum window span.
    pub const DEFAULT_MAX_BLOCKS_PER_WINDOW: u64 = 2_000;

    /// Validate before wiring components.
    pub fn validate(&self) -> RelayerResult<()> {
        invariant_confirmation_depth(self.confirmation_depth)?;
        self.event_schema.validate()?;

        if self.source_endpoint.trim().is_empty() {
            return Err(RelayerError::Config("source endpoint is empty".to_string()));
        }
        if self.destination_endpoint.trim().is_empty() {
            return Err(RelayerError::Config(
                "destination endpoint is empty".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(RelayerError::Config(
                "max retry attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(RelayerError::Config(format!(
                "backoff cap {:?} is below base delay {:?}",
                self.retry.max_delay, self.retry.base_delay
            )));
        }
        if self.max_blocks_per_window == 0 {
            return Err(RelayerError::Config(
                "max blocks per window must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_dispatches == 0 {
            return Err(RelayerError::Config(
                "max concurrent dispatches must be at least 1".to_string(),
            ));
        }
        if self.rpc_timeout.is_zero() || self.dispatch_timeout.is_zero() {
            return Err(RelayerError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            source_endpoint: "https://rpc.sepolia.org".to_string(),
            contract_address: [0u8; 20],
            event_schema: EventSchema::tokens_locked(),
            destination_endpoint: "https://api.mock-destination-chain.com/mint".to_string(),
            confirmation_depth: Self::DEFAULT_CONFIRMATION_DEPTH,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            start_offset: Self::DEFAULT_START_OFFSET,
            max_blocks_per_window: Self::DEFAULT_MAX_BLOCKS_PER_WINDOW,
            max_concurrent_dispatches: 4,
            retry: BackoffPolicy::default(),
            max_cycle_retries: 5,
            rpc_timeout: Duration::from_secs(10),
            dispatch_timeout: Duration::from_secs(10),
            event_type: "TokensLocked".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.confirmation_depth, 6);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = RelayerConfig {
            confirmation_depth: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RelayerError::Config(_))));
    }

    #[test]
    fn test_cap_below_base_rejected() {
        let mut config = RelayerConfig::default();
        config.retry.max_delay = Duration::from_secs(1);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backoff cap"));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let config = RelayerConfig {
            destination_endpoint: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = RelayerConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
