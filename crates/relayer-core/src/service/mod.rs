//! # Service Layer
//!
//! The relayer components wired over the ports.

mod coordinator;
mod dispatcher;
mod ledger_reader;

pub use coordinator::{RunExit, ScanCoordinator};
pub use dispatcher::Dispatcher;
pub use ledger_reader::LedgerReader;
