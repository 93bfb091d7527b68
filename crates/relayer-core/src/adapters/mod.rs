//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound ports: JSON-RPC ledger, HTTP destination,
//! cursor stores, the dead-letter log and alert channels.

mod alerts;
mod dead_letter_log;
mod file_cursor_store;
mod http_dispatch;
mod json_rpc_ledger;
mod memory;
#[cfg(feature = "rocksdb")]
mod rocksdb_cursor_store;

pub use alerts::{AlertRouter, ConsoleAlertChannel};
pub use dead_letter_log::JsonlDeadLetterLog;
pub use file_cursor_store::FileCursorStore;
pub use http_dispatch::{HttpDispatchTransport, IDEMPOTENCY_KEY_HEADER};
pub use json_rpc_ledger::JsonRpcLedgerClient;
pub use memory::{InMemoryAlertChannel, InMemoryCursorStore, InMemoryDeadLetterSink};
#[cfg(feature = "rocksdb")]
pub use rocksdb_cursor_store::RocksDbCursorStore;
