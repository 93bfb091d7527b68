//! # Domain Value Objects
//!
//! Immutable value types for block scanning and delivery.

use super::errors::BlockHeight;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Half-open block range `(from_block, to_block]`.
///
/// `from_block` is the committed cursor, `to_block` the highest block that
/// has the required confirmation depth. Only constructed non-empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanWindow {
    /// Exclusive lower bound (the cursor).
    pub from_block: BlockHeight,
    /// Inclusive upper bound.
    pub to_block: BlockHeight,
}

impl ScanWindow {
    /// Create a window. Returns `None` when `to_block <= from_block`.
    pub fn new(from_block: BlockHeight, to_block: BlockHeight) -> Option<Self> {
        (to_block > from_block).then_some(Self {
            from_block,
            to_block,
        })
    }

    /// Number of blocks covered.
    pub fn block_count(&self) -> u64 {
        self.to_block - self.from_block
    }

    /// First block scanned (inclusive).
    pub fn first_block(&self) -> BlockHeight {
        self.from_block + 1
    }

    /// Whether `block` lies inside the window.
    pub fn contains(&self, block: BlockHeight) -> bool {
        block > self.from_block && block <= self.to_block
    }
}

impl fmt::Display for ScanWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.from_block, self.to_block)
    }
}

/// Exponential backoff: base delay doubling per attempt, capped, with a
/// bounded number of attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total attempts (first try included).
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl BackoffPolicy {
    /// Create a policy.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Scan coordinator state machine.
///
/// ```text
/// Idle → DeterminingWindow → FetchingLogs → ProcessingEvents → CommittingCursor → Idle
///              │
///              └── no confirmed blocks ──→ Waiting ──→ Idle
///
/// any state ── recovery exhausted ──→ Faulted
/// any state ── shutdown signal ─────→ Terminated
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    /// Between cycles.
    #[default]
    Idle,
    /// Querying head height and computing the window.
    DeterminingWindow,
    /// Fetching logs for the window.
    FetchingLogs,
    /// Decoding and dispatching the window's events.
    ProcessingEvents,
    /// Persisting the advanced cursor.
    CommittingCursor,
    /// No new confirmed blocks; sleeping for the poll interval.
    Waiting,
    /// Top-level recovery exhausted; operator action required.
    Faulted,
    /// Stopped by a shutdown signal.
    Terminated,
}

/// Result of dispatching one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Destination accepted the payload (2xx).
    Delivered {
        /// Attempts used.
        attempts: u32,
    },
    /// Network/5xx failures outlasted the retry budget. Blocks the window.
    RetryableFailure {
        /// Attempts used.
        attempts: u32,
        /// Last failure.
        reason: String,
    },
    /// Destination rejected the payload. Dead-lettered.
    PermanentFailure {
        /// HTTP status returned.
        status: u16,
        /// Response detail.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_requires_progress() {
        assert!(ScanWindow::new(100, 100).is_none());
        assert!(ScanWindow::new(100, 99).is_none());

        let window = ScanWindow::new(100, 110).unwrap();
        assert_eq!(window.block_count(), 10);
        assert_eq!(window.first_block(), 101);
    }

    #[test]
    fn test_window_contains_is_half_open() {
        let window = ScanWindow::new(100, 110).unwrap();
        assert!(!window.contains(100));
        assert!(window.contains(101));
        assert!(window.contains(110));
        assert!(!window.contains(111));
    }

    #[test]
    fn test_window_display() {
        let window = ScanWindow::new(4_750_100, 4_750_204).unwrap();
        assert_eq!(window.to_string(), "(4750100, 4750204]");
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let policy = BackoffPolicy::new(6, Duration::from_secs(5), Duration::from_secs(30));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(20));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_attempt_zero_uses_base() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), policy.base_delay);
    }
}
