//! Canonical delivery payload.
//!
//! Field order is fixed by the struct declaration and the amount is a
//! decimal string, so one event always serializes to the same bytes.

use crate::domain::{to_hex, BlockHeight, BridgeEvent, RelayerError, RelayerResult};
use serde::{Deserialize, Serialize};

/// JSON body POSTed to the destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPayload {
    /// Originating block.
    pub source_block: BlockHeight,
    /// Originating transaction hash.
    pub tx_id: String,
    /// Log index within the block.
    pub log_index: u64,
    /// Source address that locked tokens.
    pub user: String,
    /// Locked token contract.
    pub token: String,
    /// Amount in base units, decimal.
    pub amount: String,
    /// Destination chain reference.
    pub destination: String,
    /// Recipient on the destination chain.
    pub recipient: String,
    /// Event name.
    pub event_type: String,
    /// `sourceBlock:txId:logIndex`.
    pub idempotency_key: String,
}

impl DispatchPayload {
    /// Build the payload for `event`.
    pub fn from_event(event: &BridgeEvent, event_type: &str) -> Self {
        Self {
            source_block: event.source_block,
            tx_id: to_hex(&event.tx_hash),
            log_index: event.log_index,
            user: to_hex(&event.user),
            token: to_hex(&event.token),
            amount: event.amount.to_string(),
            destination: to_hex(&event.destination_chain_id),
            recipient: to_hex(&event.recipient),
            event_type: event_type.to_string(),
            idempotency_key: event.key().to_string(),
        }
    }

    /// Serialize to the wire bytes.
    pub fn to_bytes(&self) -> RelayerResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RelayerError::DispatchPermanent {
            key: self.idempotency_key.clone(),
            status: 0,
            reason: format!("payload serialization failed: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;

    fn make_event() -> BridgeEvent {
        BridgeEvent {
            user: [0xAA; 20],
            token: [0xBB; 20],
            amount: U256::from_dec_str("340282366920938463463374607431768211457").unwrap(),
            destination_chain_id: [0x05; 32],
            recipient: [0xCC; 20],
            source_block: 4_750_150,
            tx_hash: [0x42; 32],
            log_index: 2,
        }
    }

    #[test]
    fn test_amount_is_exact_decimal_string() {
        let payload = DispatchPayload::from_event(&make_event(), "TokensLocked");
        // 2^128 + 1, beyond any float or u128
        assert_eq!(payload.amount, "340282366920938463463374607431768211457");
    }

    #[test]
    fn test_field_order_is_stable() {
        let bytes = DispatchPayload::from_event(&make_event(), "TokensLocked")
            .to_bytes()
            .unwrap();
        let json = String::from_utf8(bytes).unwrap();

        let order = [
            "\"sourceBlock\"",
            "\"txId\"",
            "\"logIndex\"",
            "\"user\"",
            "\"token\"",
            "\"amount\"",
            "\"destination\"",
            "\"recipient\"",
            "\"eventType\"",
            "\"idempotencyKey\"",
        ];
        let positions: Vec<usize> = order.iter().map(|f| json.find(f).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_identical_events_identical_bytes() {
        let first = DispatchPayload::from_event(&make_event(), "TokensLocked")
            .to_bytes()
            .unwrap();
        let second = DispatchPayload::from_event(&make_event(), "TokensLocked")
            .to_bytes()
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_idempotency_key_carries_block_and_tx() {
        let payload = DispatchPayload::from_event(&make_event(), "TokensLocked");
        assert_eq!(payload.source_block, 4_750_150);
        assert_eq!(payload.tx_id, format!("0x{}", "42".repeat(32)));
        assert_eq!(
            payload.idempotency_key,
            format!("4750150:0x{}:2", "42".repeat(32))
        );
    }
}
