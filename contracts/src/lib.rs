//! # SimpleSafe Contracts
//!
//! Contract logic that runs on the SimpleSafe ledger:
//!
//! - **Safe**: custodial vault with per-depositor, per-token balances and a
//!   0.1% floor-rounded withdrawal tax claimable by the owner. Supports both
//!   direct construction and one-time initialization for proxy use.
//! - **Proxy**: upgradeable indirection. Forwards every unknown selector to
//!   the current implementation by delegated call; keeps its pointer and
//!   admin in a storage region implementation code cannot address.
//! - **SafeFactory**: deploys Safes and Safe proxies per caller and holds the
//!   default implementation for new proxies.
//! - **FungibleToken**: a plain reference token, the vault's collaborator in
//!   tests and the simulator.
//!
//! [`client`] wraps each contract in a typed handle over a
//! [`Ledger`](simplesafe_ledger::Ledger).
//!
//! ## Design Principles
//!
//! 1. All monetary operations use checked arithmetic.
//! 2. Debit paths settle the books before any outbound token transfer.
//! 3. Every privileged operation compares the caller against a stored
//!    identity; there is no implicit authority.

pub mod client;
pub mod factory;
pub mod proxy;
pub mod safe;
pub mod token;

pub use client::{FactoryClient, ProxyClient, SafeClient, TokenClient};
pub use factory::SafeFactory;
pub use proxy::Proxy;
pub use safe::{Safe, TAX_DIVISOR};
pub use token::FungibleToken;
