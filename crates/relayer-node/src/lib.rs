//! # Relayer Node
//!
//! Process-level pieces of the bridge relayer: layered configuration and
//! the wiring of production adapters into the scan coordinator. The binary
//! in `main.rs` adds logging, signal handling and exit codes on top.
//!
//! ## Configuration Precedence
//!
//! ```text
//! defaults  <  --config FILE  <  environment  <  CLI flags
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod wiring;

pub use config::{ConfigFile, NodeSettings, Overrides, StorageBackend};
