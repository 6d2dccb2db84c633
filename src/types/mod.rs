//! Core ledger identifiers: addresses, object ids, digests, object references
//! and ownership.
//!
//! Addresses are 32 bytes and render as `0x`-prefixed 64-digit lowercase hex.
//! Short forms such as `0x2` are accepted on input and left-padded with zeros.
//! Digests are 32 bytes rendered as base58.

mod type_tag;

pub use type_tag::{normalize_type, StructTag, TypeTag};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length in bytes of an address / object id
pub const ADDRESS_LENGTH: usize = 32;

/// Length in bytes of an object or transaction digest
pub const DIGEST_LENGTH: usize = 32;

/// Native coin type used to pay fees
pub const NATIVE_COIN_TYPE: &str = "0x2::sui::SUI";

/// Hash used for transaction digests, addresses and signing messages
pub type Blake2b256 = blake2::Blake2b<blake2::digest::consts::U32>;

/// Errors raised while parsing identifiers from their textual form
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid hex address '{0}'")]
    InvalidHex(String),

    #[error("address '{0}' is longer than 32 bytes")]
    AddressTooLong(String),

    #[error("invalid base58 digest '{0}'")]
    InvalidBase58(String),

    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid type tag '{input}': {reason}")]
    InvalidTypeTag { input: String, reason: String },
}

/// A 32-byte account address. Object ids share the same representation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

/// Object ids are addresses
pub type ObjectId = Address;

/// Object version (lamport timestamp assigned by the ledger)
pub type SequenceNumber = u64;

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Build an address from a small integer, e.g. `Address::from_u64(2)` is `0x2`
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[ADDRESS_LENGTH - 8..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; ADDRESS_LENGTH] {
        self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        let array: [u8; ADDRESS_LENGTH] =
            bytes.try_into().map_err(|_| ParseError::InvalidLength {
                expected: ADDRESS_LENGTH,
                got: bytes.len(),
            })?;
        Ok(Self(array))
    }

    /// Parse a hex address, with or without `0x`, accepting short forms
    pub fn from_hex(input: &str) -> Result<Self, ParseError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(ParseError::InvalidHex(input.to_string()));
        }
        if digits.len() > ADDRESS_LENGTH * 2 {
            return Err(ParseError::AddressTooLong(input.to_string()));
        }

        let padded = format!("{:0>width$}", digits, width = ADDRESS_LENGTH * 2);
        let decoded =
            hex::decode(&padded).map_err(|_| ParseError::InvalidHex(input.to_string()))?;
        Self::from_slice(&decoded)
    }

    /// Full `0x` + 64 hex digit rendering
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 32-byte digest (object digest, transaction digest, events digest)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Digest([u8; DIGEST_LENGTH]);

impl Digest {
    pub const fn new(bytes: [u8; DIGEST_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LENGTH] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        let array: [u8; DIGEST_LENGTH] =
            bytes.try_into().map_err(|_| ParseError::InvalidLength {
                expected: DIGEST_LENGTH,
                got: bytes.len(),
            })?;
        Ok(Self(array))
    }

    pub fn from_base58(input: &str) -> Result<Self, ParseError> {
        let decoded = bs58::decode(input.trim())
            .into_vec()
            .map_err(|_| ParseError::InvalidBase58(input.to_string()))?;
        Self::from_slice(&decoded)
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_base58())
    }
}

impl FromStr for Digest {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_base58(&s).map_err(serde::de::Error::custom)
    }
}

/// Reference to a specific version of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: SequenceNumber,
    pub digest: Digest,
}

impl ObjectRef {
    pub fn new(object_id: ObjectId, version: SequenceNumber, digest: Digest) -> Self {
        Self {
            object_id,
            version,
            digest,
        }
    }
}

/// Ownership of an object as reported by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Owner {
    AddressOwner(Address),
    ObjectOwner(Address),
    Shared {
        initial_shared_version: SequenceNumber,
    },
    Immutable,
    ConsensusAddressOwner {
        start_version: SequenceNumber,
        owner: Address,
    },
}

impl Owner {
    /// Address that exclusively owns the object, if any
    pub fn address_owner(&self) -> Option<Address> {
        match self {
            Owner::AddressOwner(address) => Some(*address),
            Owner::ConsensusAddressOwner { owner, .. } => Some(*owner),
            _ => None,
        }
    }

    pub fn is_owned_by(&self, address: &Address) -> bool {
        self.address_owner().as_ref() == Some(address)
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Owner::Shared { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_short_form_is_padded() {
        let addr = Address::from_hex("0x2").unwrap();
        assert_eq!(addr, Address::from_u64(2));
        assert_eq!(
            addr.to_string(),
            "0x0000000000000000000000000000000000000000000000000000000000000002"
        );
    }

    #[test]
    fn test_address_rejects_garbage() {
        assert!(matches!(
            Address::from_hex("0xzz"),
            Err(ParseError::InvalidHex(_))
        ));
        assert!(matches!(Address::from_hex(""), Err(ParseError::InvalidHex(_))));

        let too_long = format!("0x{}", "1".repeat(65));
        assert!(matches!(
            Address::from_hex(&too_long),
            Err(ParseError::AddressTooLong(_))
        ));
    }

    #[test]
    fn test_digest_base58_roundtrip() {
        let digest = Digest::new([7u8; DIGEST_LENGTH]);
        let text = digest.to_string();
        assert_eq!(text.parse::<Digest>().unwrap(), digest);
    }

    #[test]
    fn test_digest_wrong_length() {
        let short = bs58::encode([1u8; 16]).into_string();
        assert_eq!(
            Digest::from_base58(&short),
            Err(ParseError::InvalidLength {
                expected: DIGEST_LENGTH,
                got: 16
            })
        );
    }

    #[test]
    fn test_address_serde_as_hex_string() {
        let addr = Address::from_u64(0xabc);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr.to_hex()));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_owner_helpers() {
        let me = Address::from_u64(1);
        assert!(Owner::AddressOwner(me).is_owned_by(&me));
        assert!(!Owner::ObjectOwner(me).is_owned_by(&me));
        assert!(Owner::Shared {
            initial_shared_version: 3
        }
        .is_shared());
        assert_eq!(Owner::Immutable.address_owner(), None);
    }
}
