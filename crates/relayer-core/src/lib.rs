//! # Relayer Core
//!
//! Confirmation-safe block scanning and at-least-once event delivery for a
//! token bridge.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Watch a source ledger for `TokensLocked` on a bridge contract and forward
//! each confirmed occurrence to a destination endpoint:
//! - Scan windows stop `confirmation_depth` blocks below the head
//! - The cursor advances only after a window is fully handed off
//! - Transient failures are retried with capped exponential backoff
//! - Malformed and rejected events are dead-lettered, never retried forever
//!
//! ## Delivery Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | Reorg safety | Window upper bound `head - depth` |
//! | No loss | Cursor saved after dispatch, single checkpoint |
//! | Dedup | Idempotency key `block:tx:log` in payload and header |
//! | Liveness | Recovery breaker faults instead of spinning silently |
//! | Visibility | Dead-letters and faults raise operator alerts |
//!
//! ## Module Structure
//!
//! ```text
//! relayer-core/
//! ├── domain/          # Events, windows, errors, recovery breaker
//! ├── algorithms/      # Window arithmetic, decoder, payload, retry
//! ├── ports/           # ScanApi, LedgerClient, DispatchTransport, stores
//! ├── adapters/        # JSON-RPC, HTTP, file/RocksDB cursor, JSONL log, alerts
//! └── service/         # LedgerReader, Dispatcher, ScanCoordinator
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    AlertRouter, ConsoleAlertChannel, FileCursorStore, HttpDispatchTransport, InMemoryAlertChannel,
    InMemoryCursorStore, InMemoryDeadLetterSink, JsonRpcLedgerClient, JsonlDeadLetterLog,
};
#[cfg(feature = "rocksdb")]
pub use adapters::RocksDbCursorStore;
pub use algorithms::{compute_window, DispatchPayload, EventDecoder, WindowDecision};
pub use config::RelayerConfig;
pub use domain::{
    Address, Alert, AlertSeverity, BackoffPolicy, BlockHeight, BridgeEvent, DeadLetter,
    DeadLetterReason, DispatchOutcome, EventKey, EventParam, EventSchema, Hash, ParamKind,
    RawLogRecord, RecoveryState, RelayerError, RelayerResult, ScanState, ScanWindow,
};
pub use ports::{
    AlertChannel, AlertSink, CursorStore, CycleOutcome, DeadLetterSink, DispatchTransport,
    LedgerClient, LogFilter, MockDispatchTransport, MockLedgerClient, MockResponse, ScanApi,
};
pub use service::{Dispatcher, LedgerReader, RunExit, ScanCoordinator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
