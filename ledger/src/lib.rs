// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SimpleSafe Ledger — Execution Model
//!
//! Contracts need somewhere to live. This crate is that somewhere: a small,
//! deterministic, single-threaded ledger that gives contract logic the same
//! guarantees a real chain would, minus the gas bill.
//!
//! ## Architecture
//!
//! - **address** — 20-byte identities, label-derived and creation-derived.
//! - **word** — the value type of storage, call arguments and return data.
//! - **storage** — hashed logic slots and the reserved admin region.
//! - **context** — the [`Contract`] trait, [`Call`] messages and the
//!   per-frame [`CallContext`] (caller, storage owner, nested calls).
//! - **state** — accounts, the [`World`] and its Merkle state root.
//! - **ledger** — atomic transactions, views and receipts.
//! - **config** — constants and [`LedgerConfig`].
//!
//! ## Guarantees
//!
//! 1. Every transaction is all-or-nothing. A failure anywhere in the call
//!    tree, however deep, restores the world to its pre-transaction state.
//! 2. A delegated call runs foreign logic against the caller's storage while
//!    preserving the original caller identity.
//! 3. Proxy bookkeeping lives in a region contract logic cannot address.

pub mod address;
pub mod config;
pub mod context;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod state;
pub mod storage;
pub mod word;

pub use address::Address;
pub use config::LedgerConfig;
pub use context::{Call, CallContext, Contract};
pub use error::{ErrorKind, ExecError};
pub use ledger::{Ledger, Receipt};
pub use state::{Account, World};
pub use storage::{AdminSlot, Slot, Storage};
pub use word::Word;
