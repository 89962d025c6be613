//! # Addresses
//!
//! Every account on the ledger, whether a human depositor or a contract, is
//! identified by a 20-byte [`Address`]. Humans get theirs from a label;
//! contracts get theirs from their creator and the creator's nonce, so
//! re-running the same deployment sequence reproduces the same addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::{ADDRESS_LENGTH, CREATE_ADDRESS_DOMAIN, LABEL_ADDRESS_DOMAIN};
use crate::hash::blake3_parts;

/// Errors from parsing an address string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The string is not valid hex.
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),

    /// The decoded bytes have the wrong length.
    #[error("invalid address length: expected 20 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 20-byte account identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The all-zero address. Stands for "nobody": an unset owner, an
    /// uninitialized pointer.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wraps raw bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derives a stable externally owned address from a human label.
    ///
    /// ```
    /// use simplesafe_ledger::Address;
    ///
    /// assert_eq!(Address::from_label("alice"), Address::from_label("alice"));
    /// assert_ne!(Address::from_label("alice"), Address::from_label("bob"));
    /// ```
    pub fn from_label(label: &str) -> Self {
        Self::truncate(blake3_parts(&[LABEL_ADDRESS_DOMAIN, label.as_bytes()]))
    }

    /// Derives the address of the contract created by `deployer` when its
    /// creation nonce is `nonce`.
    pub fn derive(deployer: &Address, nonce: u64) -> Self {
        Self::truncate(blake3_parts(&[
            CREATE_ADDRESS_DOMAIN,
            deployer.as_bytes(),
            &nonce.to_be_bytes(),
        ]))
    }

    /// Raw bytes of the address.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Returns `true` for [`Address::ZERO`].
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    fn truncate(digest: [u8; 32]) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[32 - ADDRESS_LENGTH..]);
        Self(bytes)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let decoded = hex::decode(stripped).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        let bytes: [u8; ADDRESS_LENGTH] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidLength(decoded.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
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
        s.parse().map_err(serde::de::Error::custom)
    }
}
