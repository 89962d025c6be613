//! # World State
//!
//! The world maps addresses to accounts. An account is either externally
//! owned (no code, just an identity that holds tokens and signs
//! transactions) or a contract (code plus its two storage regions).
//!
//! ## State Root
//!
//! The root hash is a Merkle root computed over sorted per-account leaves:
//!
//! ```text
//! leaf   = BLAKE3(address || code_name || nonce || logic entries || admin entries)
//! leaves = sort_by_address(accounts)
//! root   = merkle_root(leaves)
//! ```
//!
//! Sorting makes the root independent of insertion order. A reverted
//! transaction must leave the root byte-identical.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::address::Address;
use crate::context::Contract;
use crate::hash::{blake3_hash, merkle_root};
use crate::storage::{AdminSlot, Storage};
use crate::word::Word;

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// The state of a single account.
#[derive(Clone, Default)]
pub struct Account {
    /// Contract logic, `None` for externally owned accounts.
    code: Option<Arc<dyn Contract>>,
    /// Number of contracts this account has created.
    pub nonce: u64,
    /// Logic region, addressed by contract code through `Slot`s.
    pub storage: Storage,
    /// Admin region, addressed only through `AdminSlot`s.
    pub admin: BTreeMap<AdminSlot, Word>,
}

impl Account {
    /// An account running `code`.
    pub fn with_code(code: Arc<dyn Contract>) -> Self {
        Self {
            code: Some(code),
            ..Default::default()
        }
    }

    /// The code, if any.
    pub fn code(&self) -> Option<&Arc<dyn Contract>> {
        self.code.as_ref()
    }

    /// Returns `true` if this is a contract account.
    pub fn has_code(&self) -> bool {
        self.code.is_some()
    }

    fn leaf_hash(&self, address: &Address) -> [u8; 32] {
        let mut preimage = Vec::new();
        preimage.extend_from_slice(address.as_bytes());
        let name = self.code.as_ref().map(|c| c.name()).unwrap_or("");
        preimage.extend_from_slice(&(name.len() as u64).to_be_bytes());
        preimage.extend_from_slice(name.as_bytes());
        preimage.extend_from_slice(&self.nonce.to_be_bytes());
        for (slot, word) in self.storage.iter() {
            preimage.extend_from_slice(slot.as_bytes());
            preimage.extend_from_slice(&word.to_bytes());
        }
        for (slot, word) in &self.admin {
            preimage.push(slot.tag());
            preimage.extend_from_slice(&word.to_bytes());
        }
        blake3_hash(&preimage)
    }

    fn is_blank(&self) -> bool {
        self.code.is_none() && self.nonce == 0 && self.storage.is_empty() && self.admin.is_empty()
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("code", &self.code.as_ref().map(|c| c.name()))
            .field("nonce", &self.nonce)
            .field("storage_entries", &self.storage.len())
            .field("admin", &self.admin)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Every account on the ledger.
#[derive(Debug, Clone, Default)]
pub struct World {
    accounts: HashMap<Address, Account>,
}

impl World {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
        }
    }

    /// The account at `address`, if it has ever been touched.
    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Mutable access, creating a blank account on first touch.
    pub fn account_mut(&mut self, address: Address) -> &mut Account {
        self.accounts.entry(address).or_default()
    }

    /// The code at `address`, cloned out so the caller can run it while
    /// holding `&mut World`.
    pub fn code(&self, address: &Address) -> Option<Arc<dyn Contract>> {
        self.accounts.get(address).and_then(|a| a.code.clone())
    }

    /// Returns `true` if `address` holds contract code.
    pub fn has_code(&self, address: &Address) -> bool {
        self.accounts.get(address).map(Account::has_code).unwrap_or(false)
    }

    /// Installs `code` at `address`. Existing storage is kept.
    pub fn install(&mut self, address: Address, code: Arc<dyn Contract>) {
        self.account_mut(address).code = Some(code);
    }

    /// Number of non-blank accounts.
    pub fn len(&self) -> usize {
        self.accounts.values().filter(|a| !a.is_blank()).count()
    }

    /// Returns `true` if no account holds any state.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute the Merkle root over every non-blank account.
    ///
    /// Blank accounts (touched by a read, never written) are skipped so that
    /// observing an account does not change the root. An empty world returns
    /// `[0u8; 32]`.
    pub fn state_root(&self) -> [u8; 32] {
        let sorted: BTreeMap<&Address, &Account> = self
            .accounts
            .iter()
            .filter(|(_, account)| !account.is_blank())
            .collect();

        let leaves = sorted
            .iter()
            .map(|(address, account)| account.leaf_hash(address))
            .collect();

        merkle_root(leaves)
    }

    /// Iterate all (address, account) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
