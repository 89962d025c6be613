//! # Account Storage
//!
//! Each account owns two storage regions:
//!
//! ```text
//! logic region  BTreeMap<Slot, Word>       keys: BLAKE3-derived, chosen by contract code
//! admin region  BTreeMap<AdminSlot, Word>  keys: a closed enum, chosen by nobody
//! ```
//!
//! Contract logic names its state through [`Slot`] paths such as
//! `Slot::named("safe.balances").key(&token).key(&depositor)`. Proxy
//! bookkeeping uses [`AdminSlot`] variants. The two key types are disjoint,
//! so no amount of creative slot naming in an implementation can overwrite
//! the proxy's pointer or admin.
//!
//! Zero words are never stored. Writing one removes the entry, which keeps
//! "never written" and "reset to zero" indistinguishable and the state root
//! canonical.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::config::{SLOT_DOMAIN, SLOT_LENGTH};
use crate::error::ExecError;
use crate::hash::blake3_parts;
use crate::word::Word;

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// A logic-region storage key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot([u8; SLOT_LENGTH]);

impl Slot {
    /// Root slot for a named variable.
    pub fn named(label: &str) -> Self {
        Self(blake3_parts(&[SLOT_DOMAIN, label.as_bytes()]))
    }

    /// Child slot for a mapping entry keyed by an address.
    pub fn key(&self, address: &Address) -> Self {
        Self(blake3_parts(&[&self.0, b"key", address.as_bytes()]))
    }

    /// Child slot for an array element.
    pub fn index(&self, index: u128) -> Self {
        Self(blake3_parts(&[&self.0, b"index", &index.to_be_bytes()]))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SLOT_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({}…)", hex::encode(&self.0[..6]))
    }
}

// ---------------------------------------------------------------------------
// AdminSlot
// ---------------------------------------------------------------------------

/// Reserved keys of the admin region. Only code holding a variant of this
/// enum can touch the region, and contract logic addresses its own state
/// through [`Slot`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AdminSlot {
    /// The logic a proxy forwards to.
    Implementation,
    /// The identity allowed to repoint the proxy.
    Admin,
}

impl AdminSlot {
    /// Stable tag byte used when hashing the admin region.
    pub fn tag(&self) -> u8 {
        match self {
            AdminSlot::Implementation => 0,
            AdminSlot::Admin => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// The logic region of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Storage {
    words: BTreeMap<Slot, Word>,
}

impl Storage {
    /// Creates an empty region.
    pub const fn new() -> Self {
        Self {
            words: BTreeMap::new(),
        }
    }

    /// Stores `word` at `slot`, or clears the slot if the word is zero.
    pub fn set(&mut self, slot: Slot, word: impl Into<Word>) {
        let word = word.into();
        if word.is_zero() {
            self.words.remove(&slot);
        } else {
            self.words.insert(slot, word);
        }
    }

    /// Amount at `slot`; absent reads as zero.
    pub fn amount(&self, slot: &Slot) -> Result<u128, ExecError> {
        match self.words.get(slot) {
            None => Ok(0),
            Some(Word::Amount(v)) => Ok(*v),
            Some(other) => Err(ExecError::StorageCorrupted {
                expected: "amount",
                found: other.type_name(),
            }),
        }
    }

    /// Address at `slot`; absent reads as [`Address::ZERO`].
    pub fn address(&self, slot: &Slot) -> Result<Address, ExecError> {
        match self.words.get(slot) {
            None => Ok(Address::ZERO),
            Some(Word::Address(a)) => Ok(*a),
            Some(other) => Err(ExecError::StorageCorrupted {
                expected: "address",
                found: other.type_name(),
            }),
        }
    }

    /// Flag at `slot`; absent reads as `false`.
    pub fn flag(&self, slot: &Slot) -> Result<bool, ExecError> {
        match self.words.get(slot) {
            None => Ok(false),
            Some(Word::Flag(f)) => Ok(*f),
            Some(other) => Err(ExecError::StorageCorrupted {
                expected: "flag",
                found: other.type_name(),
            }),
        }
    }

    /// Appends `address` to the list rooted at `list`, returning the new
    /// length. The length lives at `list` itself, elements at `list.index(i)`.
    pub fn push_address(&mut self, list: &Slot, address: Address) -> Result<u128, ExecError> {
        let len = self.amount(list)?;
        self.set(list.index(len), address);
        let new_len = len.checked_add(1).ok_or(ExecError::Overflow)?;
        self.set(*list, new_len);
        Ok(new_len)
    }

    /// Reads element `index` of the list rooted at `list`.
    pub fn address_at(&self, list: &Slot, index: u128) -> Result<Address, ExecError> {
        let len = self.amount(list)?;
        if index >= len {
            return Err(ExecError::OutOfBounds { index, len });
        }
        self.address(&list.index(index))
    }

    /// Number of non-zero entries.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Slot, &Word)> {
        self.words.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_slots_are_distinct() {
        assert_ne!(Slot::named("a"), Slot::named("b"));
        assert_eq!(Slot::named("a"), Slot::named("a"));
    }

    #[test]
    fn mapping_and_array_children_never_collide() {
        let root = Slot::named("list");
        let alice = Address::from_label("alice");
        assert_ne!(root.key(&alice), root.index(0));
        assert_ne!(root.index(0), root.index(1));
        assert_ne!(root.key(&alice), root);
    }

    #[test]
    fn zero_write_clears() {
        let mut s = Storage::new();
        let slot = Slot::named("x");
        s.set(slot, 5u128);
        assert_eq!(s.amount(&slot).unwrap(), 5);
        s.set(slot, 0u128);
        assert!(s.is_empty());
        assert_eq!(s.amount(&slot).unwrap(), 0);
    }

    #[test]
    fn typed_reads_detect_corruption() {
        let mut s = Storage::new();
        let slot = Slot::named("owner");
        s.set(slot, Address::from_label("alice"));
        assert!(matches!(
            s.amount(&slot),
            Err(ExecError::StorageCorrupted {
                expected: "amount",
                found: "address"
            })
        ));
        assert!(s.flag(&slot).is_err());
    }

    #[test]
    fn absent_reads_default() {
        let s = Storage::new();
        let slot = Slot::named("nothing");
        assert_eq!(s.address(&slot).unwrap(), Address::ZERO);
        assert!(!s.flag(&slot).unwrap());
    }

    #[test]
    fn list_push_and_bounds() {
        let mut s = Storage::new();
        let list = Slot::named("deployed");
        let a = Address::from_label("a");
        let b = Address::from_label("b");
        assert_eq!(s.push_address(&list, a).unwrap(), 1);
        assert_eq!(s.push_address(&list, b).unwrap(), 2);
        assert_eq!(s.address_at(&list, 0).unwrap(), a);
        assert_eq!(s.address_at(&list, 1).unwrap(), b);
        assert_eq!(
            s.address_at(&list, 2),
            Err(ExecError::OutOfBounds { index: 2, len: 2 })
        );
    }
}
