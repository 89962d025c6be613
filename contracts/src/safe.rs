//! # Safe — Taxed Custodial Vault
//!
//! Depositors place fungible tokens into a Safe and take them back out later,
//! less a 0.1% withdrawal tax that accrues to the Safe's owner.
//!
//! ## Lifecycle
//!
//! ```text
//! construct([owner]) ──────────────────────────────► Initialized
//! construct([])      ──► Uninitialized ──initialize(owner)──► Initialized
//!                                         (once, ever)
//! ```
//!
//! The uninitialized path exists for proxies: a proxy shares the Safe's code
//! but never runs its constructor in its own storage, so ownership has to be
//! assigned by a separate call. Until then the owner reads as
//! [`Address::ZERO`] and every owner-only call fails.
//!
//! ## Accounting
//!
//! For every token `t`:
//!
//! ```text
//! total_deposits(t) = Σ balances[t][d]
//! total_deposits(t) + total_tax(t) == t.balance_of(safe)
//! ```
//!
//! Withdrawals and fee sweeps update the books *before* the outbound token
//! transfer; deposits credit only *after* the inbound pull succeeds. A token
//! that calls back into the Safe mid-transfer therefore always sees settled
//! books.
//!
//! ## Storage Layout
//!
//! ```text
//! simplesafe.safe.owner                       address
//! simplesafe.safe.initialized                 flag
//! simplesafe.safe.balances[token][depositor]  amount
//! simplesafe.safe.tax[token]                  amount
//! simplesafe.safe.deposits[token]             amount
//! ```

use simplesafe_ledger::{Address, Call, CallContext, Contract, ExecError, Slot, Word};

use crate::token;

/// Withdrawals pay `amount / TAX_DIVISOR` (floor) in tax: 0.1%.
pub const TAX_DIVISOR: u128 = 1000;

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// `deposit(token, amount)`
pub const DEPOSIT: &str = "deposit";
/// `withdraw(token, amount) -> amount paid out`
pub const WITHDRAW: &str = "withdraw";
/// `balance_of(token) -> amount`, scoped to the caller.
pub const BALANCE_OF: &str = "balance_of";
/// `take_fee(token) -> amount swept`, owner only.
pub const TAKE_FEE: &str = "take_fee";
/// `initialize(owner)`, once.
pub const INITIALIZE: &str = "initialize";
/// `owner() -> address`
pub const OWNER: &str = "owner";
/// `total_tax(token) -> amount`
pub const TOTAL_TAX: &str = "total_tax";
/// `total_deposits(token) -> amount`
pub const TOTAL_DEPOSITS: &str = "total_deposits";
/// `initialized() -> flag`
pub const INITIALIZED: &str = "initialized";

/// Tax charged on a withdrawal of `amount`.
pub fn tax_for(amount: u128) -> u128 {
    amount / TAX_DIVISOR
}

// ---------------------------------------------------------------------------
// Storage slots
// ---------------------------------------------------------------------------

fn owner_slot() -> Slot {
    Slot::named("simplesafe.safe.owner")
}

fn initialized_slot() -> Slot {
    Slot::named("simplesafe.safe.initialized")
}

fn balance_slot(token: &Address, depositor: &Address) -> Slot {
    Slot::named("simplesafe.safe.balances")
        .key(token)
        .key(depositor)
}

fn tax_slot(token: &Address) -> Slot {
    Slot::named("simplesafe.safe.tax").key(token)
}

fn deposits_slot(token: &Address) -> Slot {
    Slot::named("simplesafe.safe.deposits").key(token)
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// The vault logic.
///
/// Constructor arguments: `[owner]` for a directly constructed, initialized
/// Safe, or `[]` for an uninitialized one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Safe;

impl Safe {
    /// Sets the owner and the initialized flag together.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::AlreadyInitialized`] if the flag is already set,
    /// whoever is asking. Returns [`ExecError::InvalidArgument`] for a zero
    /// owner.
    fn initialize(ctx: &mut CallContext<'_>, selector: &str, owner: Address) -> Result<(), ExecError> {
        if ctx.storage().flag(&initialized_slot())? {
            return Err(ExecError::AlreadyInitialized);
        }
        if owner.is_zero() {
            return Err(ExecError::InvalidArgument {
                selector: selector.to_string(),
                index: 0,
                reason: "owner must not be the zero address".to_string(),
            });
        }

        let storage = ctx.storage_mut();
        storage.set(owner_slot(), owner);
        storage.set(initialized_slot(), true);

        tracing::debug!(safe = %ctx.this(), %owner, "safe initialized");
        Ok(())
    }

    fn deposit(ctx: &mut CallContext<'_>, call: &Call) -> Result<Option<Word>, ExecError> {
        let token = call.address(0)?;
        let amount = call.amount(1)?;
        let depositor = ctx.caller();
        let this = ctx.this();

        // Pull first. Nothing is credited unless the tokens actually arrived.
        call_token(
            ctx,
            token,
            Call::new(token::TRANSFER_FROM)
                .arg(depositor)
                .arg(this)
                .arg(amount),
        )?;

        let balance = ctx
            .storage()
            .amount(&balance_slot(&token, &depositor))?
            .checked_add(amount)
            .ok_or(ExecError::Overflow)?;
        let deposits = ctx
            .storage()
            .amount(&deposits_slot(&token))?
            .checked_add(amount)
            .ok_or(ExecError::Overflow)?;
        let storage = ctx.storage_mut();
        storage.set(balance_slot(&token, &depositor), balance);
        storage.set(deposits_slot(&token), deposits);

        tracing::debug!(safe = %this, %token, %depositor, amount, balance, "deposit");
        Ok(None)
    }

    fn withdraw(ctx: &mut CallContext<'_>, call: &Call) -> Result<Option<Word>, ExecError> {
        let token = call.address(0)?;
        let amount = call.amount(1)?;
        let depositor = ctx.caller();

        let available = ctx.storage().amount(&balance_slot(&token, &depositor))?;
        if amount > available {
            return Err(ExecError::InsufficientBalance {
                available,
                requested: amount,
            });
        }

        let tax = tax_for(amount);
        let payout = amount - tax;
        let accrued = ctx
            .storage()
            .amount(&tax_slot(&token))?
            .checked_add(tax)
            .ok_or(ExecError::Overflow)?;
        let deposits = ctx
            .storage()
            .amount(&deposits_slot(&token))?
            .checked_sub(amount)
            .ok_or(ExecError::Overflow)?;

        let storage = ctx.storage_mut();
        storage.set(balance_slot(&token, &depositor), available - amount);
        storage.set(tax_slot(&token), accrued);
        storage.set(deposits_slot(&token), deposits);

        call_token(ctx, token, Call::new(token::TRANSFER).arg(depositor).arg(payout))?;

        tracing::debug!(safe = %ctx.this(), %token, %depositor, amount, tax, payout, "withdraw");
        Ok(Some(Word::Amount(payout)))
    }

    fn take_fee(ctx: &mut CallContext<'_>, call: &Call) -> Result<Option<Word>, ExecError> {
        let token = call.address(0)?;
        let owner = ctx.storage().address(&owner_slot())?;
        let caller = ctx.caller();
        if owner.is_zero() || caller != owner {
            return Err(ExecError::Unauthorized {
                caller,
                role: "owner",
            });
        }

        let fee = ctx.storage().amount(&tax_slot(&token))?;
        ctx.storage_mut().set(tax_slot(&token), 0u128);

        call_token(ctx, token, Call::new(token::TRANSFER).arg(owner).arg(fee))?;

        tracing::debug!(safe = %ctx.this(), %token, %owner, fee, "fee taken");
        Ok(Some(Word::Amount(fee)))
    }
}

impl Contract for Safe {
    fn name(&self) -> &'static str {
        "Safe"
    }

    fn construct(&self, ctx: &mut CallContext<'_>, args: &[Word]) -> Result<(), ExecError> {
        match args {
            [] => Ok(()),
            [Word::Address(owner)] => Self::initialize(ctx, "constructor", *owner),
            [other] => Err(ExecError::InvalidArgument {
                selector: "constructor".to_string(),
                index: 0,
                reason: format!("expected address, got {}", other.type_name()),
            }),
            _ => Err(ExecError::InvalidArgument {
                selector: "constructor".to_string(),
                index: 1,
                reason: "unexpected argument".to_string(),
            }),
        }
    }

    fn execute(&self, ctx: &mut CallContext<'_>, call: &Call) -> Result<Option<Word>, ExecError> {
        match call.selector.as_str() {
            DEPOSIT => Self::deposit(ctx, call),
            WITHDRAW => Self::withdraw(ctx, call),
            TAKE_FEE => Self::take_fee(ctx, call),
            INITIALIZE => {
                let owner = call.address(0)?;
                Self::initialize(ctx, INITIALIZE, owner)?;
                Ok(None)
            }
            BALANCE_OF => {
                let token = call.address(0)?;
                let depositor = ctx.caller();
                let balance = ctx.storage().amount(&balance_slot(&token, &depositor))?;
                Ok(Some(Word::Amount(balance)))
            }
            OWNER => Ok(Some(Word::Address(ctx.storage().address(&owner_slot())?))),
            TOTAL_TAX => {
                let token = call.address(0)?;
                Ok(Some(Word::Amount(ctx.storage().amount(&tax_slot(&token))?)))
            }
            TOTAL_DEPOSITS => {
                let token = call.address(0)?;
                Ok(Some(Word::Amount(ctx.storage().amount(&deposits_slot(&token))?)))
            }
            INITIALIZED => Ok(Some(Word::Flag(ctx.storage().flag(&initialized_slot())?))),
            other => Err(ExecError::UnknownSelector {
                contract: "Safe",
                selector: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator calls
// ---------------------------------------------------------------------------

/// Calls `token` and insists on a `Flag(true)` answer.
///
/// Balance and allowance shortfalls keep their own error so callers can tell
/// "not enough tokens" from "the token misbehaved". Depth exhaustion passes
/// through unchanged. Anything else, including a `false` or missing return,
/// becomes [`ExecError::CollaboratorFailure`].
fn call_token(ctx: &mut CallContext<'_>, token: Address, call: Call) -> Result<(), ExecError> {
    match ctx.call(token, &call) {
        Ok(Some(Word::Flag(true))) => Ok(()),
        Ok(other) => Err(ExecError::CollaboratorFailure {
            collaborator: token,
            reason: match other {
                Some(word) => format!("'{}' returned {}", call.selector, word),
                None => format!("'{}' returned nothing", call.selector),
            },
        }),
        Err(e @ ExecError::InsufficientBalance { .. })
        | Err(e @ ExecError::InsufficientAllowance { .. })
        | Err(e @ ExecError::CallDepthExceeded { .. }) => Err(e),
        Err(e) => Err(ExecError::CollaboratorFailure {
            collaborator: token,
            reason: e.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
