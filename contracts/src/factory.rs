//! # Safe Factory
//!
//! Deploys Safes and Safe-fronting proxies on behalf of callers and keeps a
//! per-deployer record of what it created.
//!
//! ```text
//! deploy_safe()                     ──► Safe(owner = caller)
//! deploy_safe_proxy()               ──► Proxy(implementation = default, admin = caller)
//! deploy_initialized_safe_proxy()   ──► same, then initialize(caller) through the proxy
//! update_implementation(i)          ──► default = i   (new proxies only)
//! ```
//!
//! Changing the default never reaches into proxies that already exist: their
//! pointer lives in their own admin region and only their own admin can move
//! it.
//!
//! A proxy from `deploy_safe_proxy` is uninitialized, and whoever calls its
//! `initialize` first becomes the vault owner. Deployers who cannot call
//! `initialize` in the same transaction should use
//! `deploy_initialized_safe_proxy`.

use std::sync::Arc;

use simplesafe_ledger::{Address, Call, CallContext, Contract, ExecError, Slot, Word};

use crate::proxy::Proxy;
use crate::safe::{self, Safe};

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// `deploy_safe() -> address`
pub const DEPLOY_SAFE: &str = "deploy_safe";
/// `deploy_safe_proxy() -> address`
pub const DEPLOY_SAFE_PROXY: &str = "deploy_safe_proxy";
/// `deploy_initialized_safe_proxy() -> address`
pub const DEPLOY_INITIALIZED_SAFE_PROXY: &str = "deploy_initialized_safe_proxy";
/// `update_implementation(implementation)`, owner only.
pub const UPDATE_IMPLEMENTATION: &str = "update_implementation";
/// `deployed_safe(index) -> address`, scoped to the caller.
pub const DEPLOYED_SAFE: &str = "deployed_safe";
/// `deployed_proxy(index) -> address`, scoped to the caller.
pub const DEPLOYED_PROXY: &str = "deployed_proxy";
/// `deployed_safe_count() -> amount`, scoped to the caller.
pub const DEPLOYED_SAFE_COUNT: &str = "deployed_safe_count";
/// `deployed_proxy_count() -> amount`, scoped to the caller.
pub const DEPLOYED_PROXY_COUNT: &str = "deployed_proxy_count";
/// `implementation() -> address`
pub const IMPLEMENTATION: &str = "implementation";
/// `owner() -> address`
pub const OWNER: &str = "owner";

// ---------------------------------------------------------------------------
// Storage slots
// ---------------------------------------------------------------------------

fn owner_slot() -> Slot {
    Slot::named("simplesafe.factory.owner")
}

fn implementation_slot() -> Slot {
    Slot::named("simplesafe.factory.implementation")
}

fn safes_slot(deployer: &Address) -> Slot {
    Slot::named("simplesafe.factory.safes").key(deployer)
}

fn proxies_slot(deployer: &Address) -> Slot {
    Slot::named("simplesafe.factory.proxies").key(deployer)
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// The factory.
///
/// Constructor arguments: `[default_implementation]`. The deployer becomes
/// the factory owner.
pub struct SafeFactory {
    safe_code: Arc<dyn Contract>,
    proxy_code: Arc<dyn Contract>,
}

impl SafeFactory {
    /// A factory producing [`Safe`]s and [`Proxy`]s.
    pub fn new() -> Self {
        Self::with_code(Arc::new(Safe), Arc::new(Proxy))
    }

    /// A factory producing the given vault and proxy code.
    pub fn with_code(safe_code: Arc<dyn Contract>, proxy_code: Arc<dyn Contract>) -> Self {
        Self {
            safe_code,
            proxy_code,
        }
    }

    fn deploy_proxy(&self, ctx: &mut CallContext<'_>) -> Result<Address, ExecError> {
        let deployer = ctx.caller();
        let implementation = ctx.storage().address(&implementation_slot())?;
        let proxy = ctx.deploy(
            Arc::clone(&self.proxy_code),
            &[Word::Address(implementation), Word::Address(deployer)],
        )?;
        let count = ctx.storage_mut().push_address(&proxies_slot(&deployer), proxy)?;

        tracing::debug!(factory = %ctx.this(), %deployer, %proxy, %implementation, count, "proxy deployed");
        Ok(proxy)
    }

    fn require_owner(ctx: &CallContext<'_>) -> Result<(), ExecError> {
        let owner = ctx.storage().address(&owner_slot())?;
        if ctx.caller() != owner {
            return Err(ExecError::Unauthorized {
                caller: ctx.caller(),
                role: "owner",
            });
        }
        Ok(())
    }

    fn require_code(ctx: &CallContext<'_>, implementation: Address) -> Result<(), ExecError> {
        if !ctx.has_code(&implementation) {
            return Err(ExecError::NoCode(implementation));
        }
        Ok(())
    }
}

impl Default for SafeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl Contract for SafeFactory {
    fn name(&self) -> &'static str {
        "SafeFactory"
    }

    fn construct(&self, ctx: &mut CallContext<'_>, args: &[Word]) -> Result<(), ExecError> {
        let implementation = match args.first() {
            Some(Word::Address(a)) => *a,
            _ => {
                return Err(ExecError::InvalidArgument {
                    selector: "constructor".to_string(),
                    index: 0,
                    reason: "expected implementation address".to_string(),
                })
            }
        };
        Self::require_code(ctx, implementation)?;

        let owner = ctx.caller();
        let storage = ctx.storage_mut();
        storage.set(owner_slot(), owner);
        storage.set(implementation_slot(), implementation);

        tracing::debug!(factory = %ctx.this(), %owner, %implementation, "factory created");
        Ok(())
    }

    fn execute(&self, ctx: &mut CallContext<'_>, call: &Call) -> Result<Option<Word>, ExecError> {
        match call.selector.as_str() {
            DEPLOY_SAFE => {
                let deployer = ctx.caller();
                let safe = ctx.deploy(Arc::clone(&self.safe_code), &[Word::Address(deployer)])?;
                let count = ctx.storage_mut().push_address(&safes_slot(&deployer), safe)?;
                tracing::debug!(factory = %ctx.this(), %deployer, %safe, count, "safe deployed");
                Ok(Some(Word::Address(safe)))
            }
            DEPLOY_SAFE_PROXY => Ok(Some(Word::Address(self.deploy_proxy(ctx)?))),
            DEPLOY_INITIALIZED_SAFE_PROXY => {
                let deployer = ctx.caller();
                let proxy = self.deploy_proxy(ctx)?;
                ctx.call(proxy, &Call::new(safe::INITIALIZE).arg(deployer))?;
                Ok(Some(Word::Address(proxy)))
            }
            UPDATE_IMPLEMENTATION => {
                Self::require_owner(ctx)?;
                let implementation = call.address(0)?;
                Self::require_code(ctx, implementation)?;
                let previous = ctx.storage().address(&implementation_slot())?;
                ctx.storage_mut().set(implementation_slot(), implementation);
                tracing::debug!(factory = %ctx.this(), from = %previous, to = %implementation, "default implementation updated");
                Ok(None)
            }
            DEPLOYED_SAFE => {
                let index = call.amount(0)?;
                let deployer = ctx.caller();
                let safe = ctx.storage().address_at(&safes_slot(&deployer), index)?;
                Ok(Some(Word::Address(safe)))
            }
            DEPLOYED_PROXY => {
                let index = call.amount(0)?;
                let deployer = ctx.caller();
                let proxy = ctx.storage().address_at(&proxies_slot(&deployer), index)?;
                Ok(Some(Word::Address(proxy)))
            }
            DEPLOYED_SAFE_COUNT => {
                let deployer = ctx.caller();
                Ok(Some(Word::Amount(ctx.storage().amount(&safes_slot(&deployer))?)))
            }
            DEPLOYED_PROXY_COUNT => {
                let deployer = ctx.caller();
                Ok(Some(Word::Amount(ctx.storage().amount(&proxies_slot(&deployer))?)))
            }
            IMPLEMENTATION => Ok(Some(Word::Address(
                ctx.storage().address(&implementation_slot())?,
            ))),
            OWNER => Ok(Some(Word::Address(ctx.storage().address(&owner_slot())?))),
            other => Err(ExecError::UnknownSelector {
                contract: "SafeFactory",
                selector: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
