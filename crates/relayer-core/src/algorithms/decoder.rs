//! Log record decoding against an [`EventSchema`].
//!
//! The schema is resolved once into an alloy [`DynSolEvent`]; decoding is
//! alloy's. On top of that a record must come from the configured contract
//! and carry the canonical encoding of what it decodes to, so dirty
//! padding or trailing data is rejected rather than silently trimmed.

use crate::domain::{
    to_hex, Address, BridgeEvent, EventSchema, Hash, RawLogRecord, RelayerError, RelayerResult,
    ROLE_AMOUNT, ROLE_DESTINATION, ROLE_RECIPIENT, ROLE_TOKEN, ROLE_USER,
};
use alloy::dyn_abi::{DynSolEvent, DynSolValue, Specifier};
use alloy::primitives::B256;
use primitive_types::U256;
use std::collections::HashMap;

/// Pure decoder for the configured event.
#[derive(Clone, Debug)]
pub struct EventDecoder {
    schema: EventSchema,
    event: DynSolEvent,
    contract: Address,
    topic0: Hash,
}

impl EventDecoder {
    /// Create a decoder for `schema` emitted by `contract`.
    ///
    /// Fails if the schema lacks a bridge role.
    pub fn new(schema: EventSchema, contract: Address) -> RelayerResult<Self> {
        schema.validate()?;
        let abi_event = schema.to_abi_event();
        let event: DynSolEvent = abi_event.resolve().map_err(|e| {
            RelayerError::Config(format!("cannot resolve event {}: {}", schema.name, e))
        })?;
        let topic0 = abi_event.selector().0;
        Ok(Self {
            schema,
            event,
            contract,
            topic0,
        })
    }

    /// Topic0 records must carry.
    pub fn topic0(&self) -> Hash {
        self.topic0
    }

    /// Schema in use.
    pub fn schema(&self) -> &EventSchema {
        &self.schema
    }

    /// Decode one record into a [`BridgeEvent`].
    ///
    /// # Errors
    ///
    /// `MalformedEvent` when the record comes from another contract, does
    /// not ABI-decode as the schema (topic0, topic count, data layout), or
    /// is not canonically encoded.
    pub fn decode(&self, record: &RawLogRecord) -> RelayerResult<BridgeEvent> {
        let malformed = |reason: String| RelayerError::MalformedEvent {
            block: record.block_number,
            tx_id: to_hex(&record.tx_hash),
            reason,
        };

        if record.address != self.contract {
            return Err(malformed(format!(
                "emitted by {}, expected {}",
                to_hex(&record.address),
                to_hex(&self.contract)
            )));
        }

        let topics: Vec<B256> = record.topics.iter().copied().map(B256::from).collect();
        let decoded = self
            .event
            .decode_log_parts(topics.iter().copied(), &record.data)
            .map_err(|e| malformed(format!("abi decode: {}", e)))?;

        let canonical_topics = decoded
            .indexed
            .iter()
            .zip(&topics[1..])
            .all(|(value, topic)| value.as_word() == Some(*topic));
        let canonical_data =
            DynSolValue::Tuple(decoded.body.clone()).abi_encode_params() == record.data;
        if !canonical_topics || !canonical_data {
            return Err(malformed(format!(
                "non-canonical encoding of {}",
                self.schema.signature()
            )));
        }

        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let mut values = HashMap::with_capacity(self.schema.params.len());
        for param in &self.schema.params {
            let value = if param.indexed {
                indexed.next()
            } else {
                body.next()
            };
            let value =
                value.ok_or_else(|| malformed(format!("no value decoded for {}", param.name)))?;
            values.insert(param.name.as_str(), value);
        }

        let address = |role: &str| match values.get(role) {
            Some(DynSolValue::Address(a)) => Ok(a.0 .0),
            _ => Err(malformed(format!("{} is not an address", role))),
        };
        let amount = match values.get(ROLE_AMOUNT) {
            Some(DynSolValue::Uint(v, 256)) => U256::from_big_endian(&v.to_be_bytes::<32>()),
            _ => return Err(malformed(format!("{} is not a uint256", ROLE_AMOUNT))),
        };
        let destination_chain_id = match values.get(ROLE_DESTINATION) {
            Some(DynSolValue::FixedBytes(w, 32)) => w.0,
            _ => return Err(malformed(format!("{} is not bytes32", ROLE_DESTINATION))),
        };

        Ok(BridgeEvent {
            user: address(ROLE_USER)?,
            token: address(ROLE_TOKEN)?,
            amount,
            destination_chain_id,
            recipient: address(ROLE_RECIPIENT)?,
            source_block: record.block_number,
            tx_hash: record.tx_hash,
            log_index: record.log_index,
        })
    }
}
