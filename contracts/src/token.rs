//! # Fungible Token
//!
//! A minimal fungible token used as the vault's external collaborator in
//! tests, benches and the CLI simulator. It is deliberately plain: balances,
//! allowances, a fixed owner who may mint, and nothing else.
//!
//! ## Storage Layout
//!
//! ```text
//! simplesafe.token.owner                        address
//! simplesafe.token.supply                       amount
//! simplesafe.token.balances[holder]             amount
//! simplesafe.token.allowances[holder][spender]  amount
//! ```
//!
//! ## Failure Model
//!
//! - `transfer` / `transfer_from` fail with [`ExecError::InsufficientBalance`]
//!   when the source holds too little.
//! - `transfer_from` fails with [`ExecError::InsufficientAllowance`] before
//!   looking at the balance when the spender is not approved for the amount.
//! - Successful transfers return `Flag(true)`.

use simplesafe_ledger::{Address, Call, CallContext, Contract, ExecError, Slot, Word};

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// `transfer(to, amount) -> flag`
pub const TRANSFER: &str = "transfer";
/// `transfer_from(from, to, amount) -> flag`
pub const TRANSFER_FROM: &str = "transfer_from";
/// `approve(spender, amount) -> flag`
pub const APPROVE: &str = "approve";
/// `allowance(holder, spender) -> amount`
pub const ALLOWANCE: &str = "allowance";
/// `balance_of(holder) -> amount`
pub const BALANCE_OF: &str = "balance_of";
/// `total_supply() -> amount`
pub const TOTAL_SUPPLY: &str = "total_supply";
/// `owner() -> address`
pub const OWNER: &str = "owner";
/// `mint(to, amount) -> flag`, owner only.
pub const MINT: &str = "mint";

// ---------------------------------------------------------------------------
// Storage slots
// ---------------------------------------------------------------------------

fn owner_slot() -> Slot {
    Slot::named("simplesafe.token.owner")
}

fn supply_slot() -> Slot {
    Slot::named("simplesafe.token.supply")
}

fn balance_slot(holder: &Address) -> Slot {
    Slot::named("simplesafe.token.balances").key(holder)
}

fn allowance_slot(holder: &Address, spender: &Address) -> Slot {
    Slot::named("simplesafe.token.allowances")
        .key(holder)
        .key(spender)
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Reference fungible token.
///
/// Constructor arguments: `[initial_supply]`, minted to the deployer, who
/// also becomes the token owner. With no arguments the supply starts at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct FungibleToken;

impl FungibleToken {
    /// Moves `amount` from `from` to `to` inside the token's own storage.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::InsufficientBalance`] if `from` holds less than
    /// `amount`, or [`ExecError::Overflow`] if `to`'s balance would overflow.
    pub fn move_balance(
        ctx: &mut CallContext<'_>,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), ExecError> {
        let available = ctx.storage().amount(&balance_slot(&from))?;
        let remaining = available
            .checked_sub(amount)
            .ok_or(ExecError::InsufficientBalance {
                available,
                requested: amount,
            })?;
        ctx.storage_mut().set(balance_slot(&from), remaining);

        // Read after the debit so a self-transfer nets to zero.
        let credited = ctx
            .storage()
            .amount(&balance_slot(&to))?
            .checked_add(amount)
            .ok_or(ExecError::Overflow)?;
        ctx.storage_mut().set(balance_slot(&to), credited);
        Ok(())
    }

    fn mint_to(ctx: &mut CallContext<'_>, to: Address, amount: u128) -> Result<(), ExecError> {
        let supply = ctx
            .storage()
            .amount(&supply_slot())?
            .checked_add(amount)
            .ok_or(ExecError::Overflow)?;
        let balance = ctx
            .storage()
            .amount(&balance_slot(&to))?
            .checked_add(amount)
            .ok_or(ExecError::Overflow)?;
        ctx.storage_mut().set(supply_slot(), supply);
        ctx.storage_mut().set(balance_slot(&to), balance);
        Ok(())
    }
}

impl Contract for FungibleToken {
    fn name(&self) -> &'static str {
        "FungibleToken"
    }

    fn construct(&self, ctx: &mut CallContext<'_>, args: &[Word]) -> Result<(), ExecError> {
        let deployer = ctx.caller();
        ctx.storage_mut().set(owner_slot(), deployer);

        let supply = match args.first() {
            None => 0,
            Some(Word::Amount(v)) => *v,
            Some(other) => {
                return Err(ExecError::InvalidArgument {
                    selector: "constructor".to_string(),
                    index: 0,
                    reason: format!("expected amount, got {}", other.type_name()),
                })
            }
        };
        Self::mint_to(ctx, deployer, supply)?;

        tracing::debug!(token = %ctx.this(), %deployer, supply, "token created");
        Ok(())
    }

    fn execute(&self, ctx: &mut CallContext<'_>, call: &Call) -> Result<Option<Word>, ExecError> {
        match call.selector.as_str() {
            TRANSFER => {
                let to = call.address(0)?;
                let amount = call.amount(1)?;
                let from = ctx.caller();
                Self::move_balance(ctx, from, to, amount)?;
                tracing::trace!(token = %ctx.this(), %from, %to, amount, "transfer");
                Ok(Some(Word::Flag(true)))
            }
            TRANSFER_FROM => {
                let from = call.address(0)?;
                let to = call.address(1)?;
                let amount = call.amount(2)?;
                let spender = ctx.caller();

                let slot = allowance_slot(&from, &spender);
                let allowance = ctx.storage().amount(&slot)?;
                let remaining = allowance
                    .checked_sub(amount)
                    .ok_or(ExecError::InsufficientAllowance {
                        allowance,
                        requested: amount,
                    })?;
                ctx.storage_mut().set(slot, remaining);

                Self::move_balance(ctx, from, to, amount)?;
                tracing::trace!(token = %ctx.this(), %from, %to, %spender, amount, "transfer_from");
                Ok(Some(Word::Flag(true)))
            }
            APPROVE => {
                let spender = call.address(0)?;
                let amount = call.amount(1)?;
                let holder = ctx.caller();
                ctx.storage_mut().set(allowance_slot(&holder, &spender), amount);
                Ok(Some(Word::Flag(true)))
            }
            ALLOWANCE => {
                let holder = call.address(0)?;
                let spender = call.address(1)?;
                let allowance = ctx.storage().amount(&allowance_slot(&holder, &spender))?;
                Ok(Some(Word::Amount(allowance)))
            }
            BALANCE_OF => {
                let holder = call.address(0)?;
                Ok(Some(Word::Amount(ctx.storage().amount(&balance_slot(&holder))?)))
            }
            TOTAL_SUPPLY => Ok(Some(Word::Amount(ctx.storage().amount(&supply_slot())?))),
            OWNER => Ok(Some(Word::Address(ctx.storage().address(&owner_slot())?))),
            MINT => {
                let owner = ctx.storage().address(&owner_slot())?;
                if ctx.caller() != owner {
                    return Err(ExecError::Unauthorized {
                        caller: ctx.caller(),
                        role: "owner",
                    });
                }
                let to = call.address(0)?;
                let amount = call.amount(1)?;
                Self::mint_to(ctx, to, amount)?;
                Ok(Some(Word::Flag(true)))
            }
            other => Err(ExecError::UnknownSelector {
                contract: "FungibleToken",
                selector: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
