//! # Domain Entities
//!
//! Raw ledger records, decoded bridge events, dead-letters and operator
//! alerts.

use super::errors::{Address, BlockHeight, Hash};
use super::value_objects::ScanWindow;
use chrono::{DateTime, Utc};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format bytes as a lowercase `0x`-prefixed hex string.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Log record as returned by the source ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLogRecord {
    /// Block containing the log.
    pub block_number: BlockHeight,
    /// Transaction hash.
    pub tx_hash: Hash,
    /// Position of the transaction in the block.
    pub tx_index: u64,
    /// Position of the log in the block.
    pub log_index: u64,
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics, topic0 first.
    pub topics: Vec<Hash>,
    /// ABI-encoded non-indexed arguments.
    pub data: Vec<u8>,
    /// Node reports the log as removed by a reorg.
    pub removed: bool,
}

impl RawLogRecord {
    /// Ordering key: block, then transaction index, then log index.
    pub fn ordering_key(&self) -> (BlockHeight, u64, u64) {
        (self.block_number, self.tx_index, self.log_index)
    }

    /// Event key of this record.
    pub fn key(&self) -> EventKey {
        EventKey {
            source_block: self.block_number,
            tx_hash: self.tx_hash,
            log_index: self.log_index,
        }
    }
}

/// Identity of an event on the source chain.
///
/// Receivers deduplicate on `(source_block, tx_hash)`; the log index keeps
/// two events of the same transaction apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    /// Originating block.
    pub source_block: BlockHeight,
    /// Originating transaction.
    #[serde(with = "hex_hash")]
    pub tx_hash: Hash,
    /// Log index within the block.
    pub log_index: u64,
}

/// `0x`-prefixed hex for hashes in persisted records.
mod hex_hash {
    use super::{to_hex, Hash};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(digits).map_err(de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| de::Error::custom("expected 32 bytes"))
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.source_block,
            to_hex(&self.tx_hash),
            self.log_index
        )
    }
}

/// Decoded `TokensLocked` occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeEvent {
    /// Account that locked the tokens.
    pub user: Address,
    /// Locked token contract.
    pub token: Address,
    /// Locked amount in base units.
    pub amount: U256,
    /// Destination chain reference.
    pub destination_chain_id: Hash,
    /// Recipient on the destination chain.
    pub recipient: Address,
    /// Originating block.
    pub source_block: BlockHeight,
    /// Originating transaction.
    pub tx_hash: Hash,
    /// Log index within the block.
    pub log_index: u64,
}

impl BridgeEvent {
    /// Idempotency key of this event.
    pub fn key(&self) -> EventKey {
        EventKey {
            source_block: self.source_block,
            tx_hash: self.tx_hash,
            log_index: self.log_index,
        }
    }
}

/// Why an event left the normal delivery path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// Record did not match the event schema.
    Malformed,
    /// Destination rejected the payload.
    Rejected {
        /// HTTP status returned.
        status: u16,
    },
}

/// Event excluded from delivery, kept for manual replay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// Event identity.
    pub key: EventKey,
    /// Exclusion reason.
    pub reason: DeadLetterReason,
    /// Decoder or destination detail.
    pub detail: String,
    /// Window the event was found in.
    pub window: ScanWindow,
    /// When the window committed.
    pub recorded_at: DateTime<Utc>,
}

/// How urgently an operator should look at an [`Alert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Something was skipped; scanning goes on.
    Warning,
    /// Scanning stopped.
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Operator-facing notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    /// Urgency.
    pub severity: AlertSeverity,
    /// Human-readable text.
    pub message: String,
}

impl Alert {
    /// Warning-level alert.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: AlertSeverity::Warning,
            message: message.into(),
        }
    }

    /// Critical alert.
    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            severity: AlertSeverity::Critical,
            message: message.into(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}
