//! # Words
//!
//! A [`Word`] is the one value type the ledger moves around: it is what a
//! storage slot holds, what a call argument carries, and what a call
//! returns. Keeping it a closed enum means a balance can never be read back
//! as an owner by accident; the mismatch is an error, not a reinterpretation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// A typed storage / call value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Word {
    /// A non-negative token quantity or counter.
    Amount(u128),
    /// An account identity.
    Address(Address),
    /// A boolean flag.
    Flag(bool),
}

impl Word {
    /// Returns `true` for the zero value of any variant. Zero words are not
    /// stored; writing one clears the slot.
    pub fn is_zero(&self) -> bool {
        match self {
            Word::Amount(v) => *v == 0,
            Word::Address(a) => a.is_zero(),
            Word::Flag(f) => !*f,
        }
    }

    /// The amount inside, if this is an `Amount`.
    pub fn as_amount(&self) -> Option<u128> {
        match self {
            Word::Amount(v) => Some(*v),
            _ => None,
        }
    }

    /// The address inside, if this is an `Address`.
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Word::Address(a) => Some(*a),
            _ => None,
        }
    }

    /// The flag inside, if this is a `Flag`.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Word::Flag(f) => Some(*f),
            _ => None,
        }
    }

    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Word::Amount(_) => "amount",
            Word::Address(_) => "address",
            Word::Flag(_) => "flag",
        }
    }

    /// Canonical byte encoding used for state hashing: one tag byte followed
    /// by the big-endian payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Word::Amount(v) => {
                let mut out = vec![0u8];
                out.extend_from_slice(&v.to_be_bytes());
                out
            }
            Word::Address(a) => {
                let mut out = vec![1u8];
                out.extend_from_slice(a.as_bytes());
                out
            }
            Word::Flag(f) => vec![2u8, u8::from(*f)],
        }
    }
}

impl From<u128> for Word {
    fn from(v: u128) -> Self {
        Word::Amount(v)
    }
}

impl From<Address> for Word {
    fn from(a: Address) -> Self {
        Word::Address(a)
    }
}

impl From<bool> for Word {
    fn from(f: bool) -> Self {
        Word::Flag(f)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Word::Amount(v) => write!(f, "{}", v),
            Word::Address(a) => write!(f, "{}", a),
            Word::Flag(b) => write!(f, "{}", b),
        }
    }
}
