//! # Inbound Ports
//!
//! API trait defining what the scanner can do.

use crate::domain::{BlockHeight, EventKey, RelayerResult, ScanState, ScanWindow};
use async_trait::async_trait;

/// What one scan cycle did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Confirmed head has not passed the cursor; nothing fetched.
    NoNewBlocks {
        /// Head height observed.
        head: BlockHeight,
        /// Cursor at the time.
        cursor: BlockHeight,
    },
    /// Window processed and cursor advanced to `window.to_block`.
    Committed {
        /// The committed window.
        window: ScanWindow,
        /// Events delivered.
        delivered: usize,
        /// Records skipped as malformed.
        malformed: usize,
        /// Events rejected by the destination.
        rejected: usize,
        /// More confirmed blocks remain beyond this window.
        capped: bool,
    },
    /// Some dispatches are still failing; cursor not advanced.
    Stalled {
        /// The window that must be retried.
        window: ScanWindow,
        /// Events whose dispatch failed.
        pending: Vec<EventKey>,
    },
}

impl CycleOutcome {
    /// Whether the cycle counts as a failure for recovery purposes.
    pub fn is_stalled(&self) -> bool {
        matches!(self, Self::Stalled { .. })
    }
}

/// Scanner API - inbound port.
#[async_trait]
pub trait ScanApi: Send {
    /// Run one cycle: height → window → logs → decode → dispatch → commit.
    async fn run_cycle(&mut self) -> RelayerResult<CycleOutcome>;

    /// Committed cursor.
    fn cursor(&self) -> BlockHeight;

    /// Current state machine state.
    fn state(&self) -> ScanState;
}
