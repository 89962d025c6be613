//! # Ledger — Atomic Transactions
//!
//! The [`Ledger`] owns the [`World`] and admits transactions one at a time
//! (`&mut self` is the serialization point). Each transaction runs against
//! the live world; if anything in its call tree fails, the world is put back
//! exactly as it was before the transaction started:
//!
//! ```text
//! snapshot = world.clone()
//! result   = run(entry frame)
//! on error: world = snapshot
//! ```
//!
//! Views run against a throwaway copy and never commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::address::Address;
use crate::config::LedgerConfig;
use crate::context::{create_contract, run_frame, Call, Contract, Frame};
use crate::error::ExecError;
use crate::state::World;
use crate::word::Word;

/// Record of a committed transaction.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    /// Unique transaction identifier.
    pub tx_id: Uuid,
    /// Position in the ledger's commit order, starting at 1.
    pub sequence: u64,
    /// Originating identity.
    pub from: Address,
    /// Entry contract.
    pub to: Address,
    /// Selector that was invoked.
    pub selector: String,
    /// Value returned by the entry frame.
    pub output: Option<Word>,
    /// Commit time.
    pub timestamp: DateTime<Utc>,
}

/// A single-threaded, transaction-ordered ledger.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    world: World,
    config: LedgerConfig,
    sequence: u64,
}

impl Ledger {
    /// Creates an empty ledger with default configuration.
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    /// Creates an empty ledger with the given configuration.
    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            world: World::new(),
            config,
            sequence: 0,
        }
    }

    /// Read-only access to the world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Merkle root of the current world.
    pub fn state_root(&self) -> [u8; 32] {
        self.world.state_root()
    }

    /// Number of committed transactions and deployments.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Deploys `code` from `from`, running its constructor with `args`.
    /// Returns the new contract's address.
    ///
    /// # Errors
    ///
    /// Any error raised by the constructor. The world is left untouched,
    /// including `from`'s creation nonce.
    pub fn deploy(
        &mut self,
        from: Address,
        code: Arc<dyn Contract>,
        args: &[Word],
    ) -> Result<Address, ExecError> {
        let name = code.name();
        let max_depth = self.config.max_call_depth;
        let address = self.atomically(|world| create_contract(world, from, code, args, 0, max_depth));

        match &address {
            Ok(address) => {
                self.sequence += 1;
                tracing::info!(contract = name, %address, deployer = %from, "deployed");
            }
            Err(e) => tracing::warn!(contract = name, deployer = %from, error = %e, "deployment reverted"),
        }
        address
    }

    /// Executes `call` against `to` as a transaction from `from`.
    ///
    /// # Errors
    ///
    /// Any error raised anywhere in the call tree. On error nothing is
    /// committed.
    pub fn transact(&mut self, from: Address, to: Address, call: Call) -> Result<Receipt, ExecError> {
        let frame = Frame {
            this: to,
            caller: from,
            code: to,
            depth: 0,
        };
        let max_depth = self.config.max_call_depth;
        let result = self.atomically(|world| run_frame(world, frame, &call, max_depth));

        match result {
            Ok(output) => {
                self.sequence += 1;
                let receipt = Receipt {
                    tx_id: Uuid::new_v4(),
                    sequence: self.sequence,
                    from,
                    to,
                    selector: call.selector,
                    output,
                    timestamp: Utc::now(),
                };
                tracing::debug!(
                    sequence = receipt.sequence,
                    %from,
                    %to,
                    selector = %receipt.selector,
                    "transaction committed"
                );
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(%from, %to, selector = %call.selector, error = %e, "transaction reverted");
                Err(e)
            }
        }
    }

    /// Executes `call` against a copy of the world and returns its output.
    /// Nothing is ever committed, even on success.
    pub fn view(&self, from: Address, to: Address, call: &Call) -> Result<Option<Word>, ExecError> {
        let mut scratch = self.world.clone();
        let frame = Frame {
            this: to,
            caller: from,
            code: to,
            depth: 0,
        };
        run_frame(&mut scratch, frame, call, self.config.max_call_depth)
    }

    fn atomically<T>(
        &mut self,
        f: impl FnOnce(&mut World) -> Result<T, ExecError>,
    ) -> Result<T, ExecError> {
        let snapshot = self.world.clone();
        let result = f(&mut self.world);
        if result.is_err() {
            self.world = snapshot;
        }
        result
    }
}
