//! # Proxy — Upgradeable Indirection
//!
//! A proxy owns storage but no logic of its own. Calls it does not recognize
//! are run through the current implementation's code against the proxy's
//! logic region, with the original caller preserved:
//!
//! ```text
//! user ──call──► Proxy ──delegate──► Safe code
//!                  │                    │
//!                  └── admin region     └── reads/writes Proxy's logic region
//!                      (implementation, admin)
//! ```
//!
//! The proxy's own bookkeeping lives in the admin region, keyed by
//! [`AdminSlot`]. The ledger refuses admin-region access from delegated
//! frames, so implementation code can only reach [`Slot`]s: it can never
//! move the pointer or the admin, and the pointer can never clobber vault
//! state.
//!
//! The proxy's selectors shadow identically named implementation selectors;
//! an implementation's `upgrade` is unreachable through a proxy.
//!
//! [`Slot`]: simplesafe_ledger::Slot

use simplesafe_ledger::{Address, AdminSlot, Call, CallContext, Contract, ExecError, Word};

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// `upgrade(target)`, admin only.
pub const UPGRADE: &str = "upgrade";
/// `change_admin(admin)`, admin only.
pub const CHANGE_ADMIN: &str = "change_admin";
/// `implementation() -> address`
pub const IMPLEMENTATION: &str = "implementation";
/// `admin() -> address`
pub const ADMIN: &str = "admin";

/// The indirection layer.
///
/// Constructor arguments: `[implementation, admin]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Proxy;

impl Proxy {
    fn read(ctx: &CallContext<'_>, slot: AdminSlot) -> Result<Address, ExecError> {
        match ctx.admin(slot)? {
            None => Ok(Address::ZERO),
            Some(Word::Address(a)) => Ok(a),
            Some(other) => Err(ExecError::StorageCorrupted {
                expected: "address",
                found: other.type_name(),
            }),
        }
    }

    fn require_admin(ctx: &CallContext<'_>) -> Result<(), ExecError> {
        let admin = Self::read(ctx, AdminSlot::Admin)?;
        if ctx.caller() != admin {
            return Err(ExecError::Unauthorized {
                caller: ctx.caller(),
                role: "admin",
            });
        }
        Ok(())
    }

    fn require_code(ctx: &CallContext<'_>, target: Address) -> Result<(), ExecError> {
        if !ctx.has_code(&target) {
            return Err(ExecError::NoCode(target));
        }
        Ok(())
    }

    fn require_nonzero(selector: &str, index: usize, address: Address) -> Result<(), ExecError> {
        if address.is_zero() {
            return Err(ExecError::InvalidArgument {
                selector: selector.to_string(),
                index,
                reason: "zero address".to_string(),
            });
        }
        Ok(())
    }
}

impl Contract for Proxy {
    fn name(&self) -> &'static str {
        "Proxy"
    }

    fn construct(&self, ctx: &mut CallContext<'_>, args: &[Word]) -> Result<(), ExecError> {
        let call = Call {
            selector: "constructor".to_string(),
            args: args.to_vec(),
        };
        let implementation = call.address(0)?;
        let admin = call.address(1)?;
        Self::require_code(ctx, implementation)?;
        Self::require_nonzero(&call.selector, 1, admin)?;

        ctx.set_admin(AdminSlot::Implementation, implementation)?;
        ctx.set_admin(AdminSlot::Admin, admin)?;

        tracing::debug!(proxy = %ctx.this(), %implementation, %admin, "proxy created");
        Ok(())
    }

    fn execute(&self, ctx: &mut CallContext<'_>, call: &Call) -> Result<Option<Word>, ExecError> {
        match call.selector.as_str() {
            UPGRADE => {
                Self::require_admin(ctx)?;
                let target = call.address(0)?;
                Self::require_code(ctx, target)?;
                let previous = Self::read(ctx, AdminSlot::Implementation)?;
                ctx.set_admin(AdminSlot::Implementation, target)?;
                tracing::debug!(proxy = %ctx.this(), from = %previous, to = %target, "proxy upgraded");
                Ok(None)
            }
            CHANGE_ADMIN => {
                Self::require_admin(ctx)?;
                let admin = call.address(0)?;
                Self::require_nonzero(CHANGE_ADMIN, 0, admin)?;
                ctx.set_admin(AdminSlot::Admin, admin)?;
                tracing::debug!(proxy = %ctx.this(), %admin, "proxy admin changed");
                Ok(None)
            }
            IMPLEMENTATION => Ok(Some(Word::Address(Self::read(ctx, AdminSlot::Implementation)?))),
            ADMIN => Ok(Some(Word::Address(Self::read(ctx, AdminSlot::Admin)?))),
            _ => {
                let implementation = Self::read(ctx, AdminSlot::Implementation)?;
                ctx.delegate(implementation, call)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
