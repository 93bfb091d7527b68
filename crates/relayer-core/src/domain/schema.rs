//! # Event Schema
//!
//! Descriptor of the watched event: name plus ordered, typed parameters.
//! It resolves to an alloy JSON-ABI [`Event`], which yields the canonical
//! signature and its selector (topic0).

use super::errors::{Hash, RelayerError, RelayerResult};
use alloy::json_abi::{Event, EventParam as AbiEventParam};
use serde::{Deserialize, Serialize};

/// Parameter roles a bridge event must provide.
pub const ROLE_USER: &str = "user";
/// Locked token.
pub const ROLE_TOKEN: &str = "token";
/// Locked amount.
pub const ROLE_AMOUNT: &str = "amount";
/// Destination chain reference.
pub const ROLE_DESTINATION: &str = "destinationChainId";
/// Destination recipient.
pub const ROLE_RECIPIENT: &str = "recipient";

/// ABI parameter kinds the decoder understands. Each occupies one 32-byte word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// 20-byte address, left-padded with zeros.
    Address,
    /// 256-bit unsigned integer.
    Uint256,
    /// Raw 32-byte value.
    Bytes32,
}

impl ParamKind {
    /// Canonical ABI type name.
    pub fn abi_name(&self) -> &'static str {
        match self {
            ParamKind::Address => "address",
            ParamKind::Uint256 => "uint256",
            ParamKind::Bytes32 => "bytes32",
        }
    }
}

/// One event parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParam {
    /// Parameter name.
    pub name: String,
    /// ABI kind.
    pub kind: ParamKind,
    /// Whether the value is carried in a topic instead of data.
    #[serde(default)]
    pub indexed: bool,
}

impl EventParam {
    /// Create a parameter.
    pub fn new(name: impl Into<String>, kind: ParamKind, indexed: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            indexed,
        }
    }
}

/// Event schema descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSchema {
    /// Event name.
    pub name: String,
    /// Parameters in declaration order.
    pub params: Vec<EventParam>,
}

impl EventSchema {
    /// The bridge contract's `TokensLocked` event.
    pub fn tokens_locked() -> Self {
        Self {
            name: "TokensLocked".to_string(),
            params: vec![
                EventParam::new(ROLE_USER, ParamKind::Address, true),
                EventParam::new(ROLE_TOKEN, ParamKind::Address, true),
                EventParam::new(ROLE_AMOUNT, ParamKind::Uint256, false),
                EventParam::new(ROLE_DESTINATION, ParamKind::Bytes32, true),
                EventParam::new(ROLE_RECIPIENT, ParamKind::Address, false),
            ],
        }
    }

    /// JSON-ABI form of this schema.
    pub fn to_abi_event(&self) -> Event {
        Event {
            name: self.name.clone(),
            inputs: self
                .params
                .iter()
                .map(|p| AbiEventParam {
                    ty: p.kind.abi_name().to_string(),
                    name: p.name.clone(),
                    indexed: p.indexed,
                    components: Vec::new(),
                    internal_type: None,
                })
                .collect(),
            anonymous: false,
        }
    }

    /// Canonical signature, e.g. `TokensLocked(address,address,uint256,bytes32,address)`.
    pub fn signature(&self) -> String {
        self.to_abi_event().signature()
    }

    /// Event selector: Keccak-256 of the signature.
    pub fn topic0(&self) -> Hash {
        self.to_abi_event().selector().0
    }

    /// Number of indexed parameters.
    pub fn indexed_count(&self) -> usize {
        self.params.iter().filter(|p| p.indexed).count()
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&EventParam> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Check that every bridge role is present with the right kind.
    pub fn validate(&self) -> RelayerResult<()> {
        if self.name.is_empty() {
            return Err(RelayerError::Config("event schema has no name".to_string()));
        }
        // topic0 plus at most three indexed arguments
        if self.indexed_count() > 3 {
            return Err(RelayerError::Config(format!(
                "event {} has {} indexed params (max 3)",
                self.name,
                self.indexed_count()
            )));
        }

        let required = [
            (ROLE_USER, ParamKind::Address),
            (ROLE_TOKEN, ParamKind::Address),
            (ROLE_AMOUNT, ParamKind::Uint256),
            (ROLE_DESTINATION, ParamKind::Bytes32),
            (ROLE_RECIPIENT, ParamKind::Address),
        ];
        for (role, kind) in required {
            match self.param(role) {
                Some(param) if param.kind == kind => {}
                Some(param) => {
                    return Err(RelayerError::Config(format!(
                        "event param {} must be {}, found {}",
                        role,
                        kind.abi_name(),
                        param.kind.abi_name()
                    )))
                }
                None => {
                    return Err(RelayerError::Config(format!(
                        "event {} is missing param {}",
                        self.name, role
                    )))
                }
            }
        }
        Ok(())
    }
}

impl Default for EventSchema {
    fn default() -> Self {
        Self::tokens_locked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_locked_signature() {
        let schema = EventSchema::tokens_locked();
        assert_eq!(
            schema.signature(),
            "TokensLocked(address,address,uint256,bytes32,address)"
        );
    }

    #[test]
    fn test_topic0_is_keccak_of_signature() {
        // keccak256("Transfer(address,address,uint256)") is the well-known ERC-20 topic
        let schema = EventSchema {
            name: "Transfer".to_string(),
            params: vec![
                EventParam::new("from", ParamKind::Address, true),
                EventParam::new("to", ParamKind::Address, true),
                EventParam::new("value", ParamKind::Uint256, false),
            ],
        };
        assert_eq!(
            hex::encode(schema.topic0()),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_abi_event_marks_indexed_params() {
        let event = EventSchema::tokens_locked().to_abi_event();
        let indexed: Vec<&str> = event
            .inputs
            .iter()
            .filter(|p| p.indexed)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(indexed, vec![ROLE_USER, ROLE_TOKEN, ROLE_DESTINATION]);
        assert!(!event.anonymous);
    }

    #[test]
    fn test_validate_accepts_default() {
        assert!(EventSchema::tokens_locked().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_role() {
        let mut schema = EventSchema::tokens_locked();
        schema.params.retain(|p| p.name != ROLE_RECIPIENT);
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("recipient"));
    }

    #[test]
    fn test_validate_rejects_wrong_kind() {
        let mut schema = EventSchema::tokens_locked();
        schema.params[2].kind = ParamKind::Bytes32;
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_too_many_indexed() {
        let mut schema = EventSchema::tokens_locked();
        for param in &mut schema.params {
            param.indexed = true;
        }
        assert!(schema.validate().is_err());
    }
}
