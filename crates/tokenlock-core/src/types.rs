//! Core type definitions for Tokenlock

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ProtocolError;

/// Account or contract address (20 bytes, `0x`-prefixed lowercase hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Byte length of an address
    pub const LEN: usize = 20;

    /// Parse and normalise an address. Accepts mixed-case hex.
    pub fn parse(addr: impl AsRef<str>) -> Result<Self, ProtocolError> {
        let addr = addr.as_ref().trim();
        let digits = addr
            .strip_prefix("0x")
            .or_else(|| addr.strip_prefix("0X"))
            .ok_or_else(|| ProtocolError::InvalidAddress {
                address: addr.to_string(),
                reason: "missing 0x prefix".to_string(),
            })?;

        if digits.len() != Self::LEN * 2 {
            return Err(ProtocolError::InvalidAddress {
                address: addr.to_string(),
                reason: format!("expected 40 hex digits, got {}", digits.len()),
            });
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ProtocolError::InvalidAddress {
                address: addr.to_string(),
                reason: "non-hex character".to_string(),
            });
        }

        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    /// Build an address from raw bytes
    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw 20 address bytes
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        // Validated at construction, decoding cannot fail
        if let Ok(decoded) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&decoded);
        }
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

/// Transaction hash (32 bytes, hex-encoded)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Proof that a write call was confirmed by the registry's chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    /// Block the transaction was included in
    pub block_number: u64,
}

/// Position of a lock within its owner's lock sequence
pub type LockIndex = u64;

/// Unix timestamp in seconds
pub type UnixSeconds = u64;

/// A single time-locked deposit as reported by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    /// Locked token contract
    pub token: Address,
    /// Amount in the token's smallest unit
    #[serde(with = "decimal_string")]
    pub amount: BigUint,
    /// Timestamp after which the lock may be withdrawn
    pub unlock_time: UnixSeconds,
    pub withdrawn: bool,
}

/// Serialize arbitrary-precision amounts as decimal strings
mod decimal_string {
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(deserializer)?;
        BigUint::parse_bytes(s.as_bytes(), 10)
            .ok_or_else(|| de::Error::custom(format!("invalid decimal amount: {}", s)))
    }
}

/// Constants
pub mod constants {
    /// Display decimals assumed for every locked token
    pub const TOKEN_DECIMALS: u32 = 18;
}
