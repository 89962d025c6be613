//! # Typed Clients
//!
//! Thin wrappers that turn method calls into [`Call`]s against a [`Ledger`]
//! and decode the returned [`Word`]s. State-changing methods take
//! `&mut Ledger` and commit a transaction; read methods take `&Ledger` and
//! go through [`Ledger::view`].
//!
//! ```ignore
//! let token = TokenClient::deploy(&mut ledger, alice, 10_000)?;
//! let safe = SafeClient::deploy(&mut ledger, owner, Some(owner))?;
//! token.approve(&mut ledger, alice, safe.address(), 4_000)?;
//! safe.deposit(&mut ledger, alice, token.address(), 4_000)?;
//! ```

use std::sync::Arc;

use simplesafe_ledger::{Address, Call, ExecError, Ledger, Receipt, Word};

use crate::factory::{self, SafeFactory};
use crate::proxy::{self, Proxy};
use crate::safe::{self, Safe};
use crate::token::{self, FungibleToken};

// ---------------------------------------------------------------------------
// Output decoding
// ---------------------------------------------------------------------------

fn amount_out(selector: &str, output: Option<Word>) -> Result<u128, ExecError> {
    output
        .and_then(|w| w.as_amount())
        .ok_or_else(|| unexpected(selector, "amount"))
}

fn address_out(selector: &str, output: Option<Word>) -> Result<Address, ExecError> {
    output
        .and_then(|w| w.as_address())
        .ok_or_else(|| unexpected(selector, "address"))
}

fn flag_out(selector: &str, output: Option<Word>) -> Result<bool, ExecError> {
    output
        .and_then(|w| w.as_flag())
        .ok_or_else(|| unexpected(selector, "flag"))
}

fn unexpected(selector: &str, expected: &'static str) -> ExecError {
    ExecError::UnexpectedReturn {
        selector: selector.to_string(),
        expected,
    }
}

// ---------------------------------------------------------------------------
// SafeClient
// ---------------------------------------------------------------------------

/// Client for a Safe, deployed directly or behind a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeClient {
    address: Address,
}

impl SafeClient {
    /// A client for the Safe (or Safe-fronting proxy) at `address`.
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    /// Deploys a Safe from `from`. `Some(owner)` constructs it initialized;
    /// `None` leaves it waiting for [`initialize`](Self::initialize).
    ///
    /// # Errors
    ///
    /// Any constructor error, e.g. a zero owner.
    pub fn deploy(ledger: &mut Ledger, from: Address, owner: Option<Address>) -> Result<Self, ExecError> {
        let args: Vec<Word> = owner.into_iter().map(Word::Address).collect();
        let address = ledger.deploy(from, Arc::new(Safe), &args)?;
        Ok(Self::at(address))
    }

    /// The contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Deposits `amount` of `token`. The Safe must already be approved.
    pub fn deposit(
        &self,
        ledger: &mut Ledger,
        from: Address,
        token: Address,
        amount: u128,
    ) -> Result<Receipt, ExecError> {
        ledger.transact(from, self.address, Call::new(safe::DEPOSIT).arg(token).arg(amount))
    }

    /// Withdraws `amount` of `token` and returns what was paid out after tax.
    pub fn withdraw(
        &self,
        ledger: &mut Ledger,
        from: Address,
        token: Address,
        amount: u128,
    ) -> Result<u128, ExecError> {
        let receipt = ledger.transact(
            from,
            self.address,
            Call::new(safe::WITHDRAW).arg(token).arg(amount),
        )?;
        amount_out(safe::WITHDRAW, receipt.output)
    }

    /// Sweeps the accrued tax for `token` to the owner and returns the amount.
    pub fn take_fee(&self, ledger: &mut Ledger, from: Address, token: Address) -> Result<u128, ExecError> {
        let receipt = ledger.transact(from, self.address, Call::new(safe::TAKE_FEE).arg(token))?;
        amount_out(safe::TAKE_FEE, receipt.output)
    }

    /// Assigns the owner of an uninitialized Safe.
    pub fn initialize(&self, ledger: &mut Ledger, from: Address, owner: Address) -> Result<Receipt, ExecError> {
        ledger.transact(from, self.address, Call::new(safe::INITIALIZE).arg(owner))
    }

    /// `who`'s recorded balance of `token`.
    pub fn balance_of(&self, ledger: &Ledger, who: Address, token: Address) -> Result<u128, ExecError> {
        let out = ledger.view(who, self.address, &Call::new(safe::BALANCE_OF).arg(token))?;
        amount_out(safe::BALANCE_OF, out)
    }

    /// The owner, or [`Address::ZERO`] before initialization.
    pub fn owner(&self, ledger: &Ledger) -> Result<Address, ExecError> {
        let out = ledger.view(Address::ZERO, self.address, &Call::new(safe::OWNER))?;
        address_out(safe::OWNER, out)
    }

    /// Tax accrued on `token` and not yet swept.
    pub fn total_tax(&self, ledger: &Ledger, token: Address) -> Result<u128, ExecError> {
        let out = ledger.view(Address::ZERO, self.address, &Call::new(safe::TOTAL_TAX).arg(token))?;
        amount_out(safe::TOTAL_TAX, out)
    }

    /// Sum of every depositor's balance of `token`.
    pub fn total_deposits(&self, ledger: &Ledger, token: Address) -> Result<u128, ExecError> {
        let out = ledger.view(
            Address::ZERO,
            self.address,
            &Call::new(safe::TOTAL_DEPOSITS).arg(token),
        )?;
        amount_out(safe::TOTAL_DEPOSITS, out)
    }

    /// Whether an owner has been assigned.
    pub fn initialized(&self, ledger: &Ledger) -> Result<bool, ExecError> {
        let out = ledger.view(Address::ZERO, self.address, &Call::new(safe::INITIALIZED))?;
        flag_out(safe::INITIALIZED, out)
    }
}

// ---------------------------------------------------------------------------
// ProxyClient
// ---------------------------------------------------------------------------

/// Client for the proxy's own selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyClient {
    address: Address,
}

impl ProxyClient {
    /// A client for the proxy at `address`.
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    /// Deploys a proxy pointing at `implementation`, administered by `admin`.
    ///
    /// # Errors
    ///
    /// [`ExecError::NoCode`] if `implementation` holds no code.
    pub fn deploy(
        ledger: &mut Ledger,
        from: Address,
        implementation: Address,
        admin: Address,
    ) -> Result<Self, ExecError> {
        let address = ledger.deploy(
            from,
            Arc::new(Proxy),
            &[Word::Address(implementation), Word::Address(admin)],
        )?;
        Ok(Self::at(address))
    }

    /// The contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The same address viewed as a Safe, for forwarded calls.
    pub fn as_safe(&self) -> SafeClient {
        SafeClient::at(self.address)
    }

    /// Repoints the proxy. Admin only.
    pub fn upgrade(&self, ledger: &mut Ledger, from: Address, target: Address) -> Result<Receipt, ExecError> {
        ledger.transact(from, self.address, Call::new(proxy::UPGRADE).arg(target))
    }

    /// Hands the admin role to `admin`. Admin only.
    pub fn change_admin(&self, ledger: &mut Ledger, from: Address, admin: Address) -> Result<Receipt, ExecError> {
        ledger.transact(from, self.address, Call::new(proxy::CHANGE_ADMIN).arg(admin))
    }

    /// Current implementation.
    pub fn implementation(&self, ledger: &Ledger) -> Result<Address, ExecError> {
        let out = ledger.view(Address::ZERO, self.address, &Call::new(proxy::IMPLEMENTATION))?;
        address_out(proxy::IMPLEMENTATION, out)
    }

    /// Current admin.
    pub fn admin(&self, ledger: &Ledger) -> Result<Address, ExecError> {
        let out = ledger.view(Address::ZERO, self.address, &Call::new(proxy::ADMIN))?;
        address_out(proxy::ADMIN, out)
    }
}

// ---------------------------------------------------------------------------
// FactoryClient
// ---------------------------------------------------------------------------

/// Client for a [`SafeFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactoryClient {
    address: Address,
}

impl FactoryClient {
    /// A client for the factory at `address`.
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    /// Deploys a factory owned by `from` with `implementation` as the default.
    pub fn deploy(ledger: &mut Ledger, from: Address, implementation: Address) -> Result<Self, ExecError> {
        let address = ledger.deploy(
            from,
            Arc::new(SafeFactory::new()),
            &[Word::Address(implementation)],
        )?;
        Ok(Self::at(address))
    }

    /// The contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Deploys a Safe owned by `from`.
    pub fn deploy_safe(&self, ledger: &mut Ledger, from: Address) -> Result<SafeClient, ExecError> {
        let receipt = ledger.transact(from, self.address, Call::new(factory::DEPLOY_SAFE))?;
        address_out(factory::DEPLOY_SAFE, receipt.output).map(SafeClient::at)
    }

    /// Deploys an uninitialized Safe proxy administered by `from`.
    pub fn deploy_safe_proxy(&self, ledger: &mut Ledger, from: Address) -> Result<ProxyClient, ExecError> {
        let receipt = ledger.transact(from, self.address, Call::new(factory::DEPLOY_SAFE_PROXY))?;
        address_out(factory::DEPLOY_SAFE_PROXY, receipt.output).map(ProxyClient::at)
    }

    /// Deploys a Safe proxy administered and owned by `from`.
    pub fn deploy_initialized_safe_proxy(
        &self,
        ledger: &mut Ledger,
        from: Address,
    ) -> Result<ProxyClient, ExecError> {
        let receipt = ledger.transact(
            from,
            self.address,
            Call::new(factory::DEPLOY_INITIALIZED_SAFE_PROXY),
        )?;
        address_out(factory::DEPLOY_INITIALIZED_SAFE_PROXY, receipt.output).map(ProxyClient::at)
    }

    /// Changes the default implementation for future proxies. Owner only.
    pub fn update_implementation(
        &self,
        ledger: &mut Ledger,
        from: Address,
        implementation: Address,
    ) -> Result<Receipt, ExecError> {
        ledger.transact(
            from,
            self.address,
            Call::new(factory::UPDATE_IMPLEMENTATION).arg(implementation),
        )
    }

    /// The `index`-th Safe deployed by `who`.
    pub fn deployed_safe(&self, ledger: &Ledger, who: Address, index: u128) -> Result<Address, ExecError> {
        let out = ledger.view(who, self.address, &Call::new(factory::DEPLOYED_SAFE).arg(index))?;
        address_out(factory::DEPLOYED_SAFE, out)
    }

    /// The `index`-th proxy deployed by `who`.
    pub fn deployed_proxy(&self, ledger: &Ledger, who: Address, index: u128) -> Result<Address, ExecError> {
        let out = ledger.view(who, self.address, &Call::new(factory::DEPLOYED_PROXY).arg(index))?;
        address_out(factory::DEPLOYED_PROXY, out)
    }

    /// Number of Safes deployed by `who`.
    pub fn deployed_safe_count(&self, ledger: &Ledger, who: Address) -> Result<u128, ExecError> {
        let out = ledger.view(who, self.address, &Call::new(factory::DEPLOYED_SAFE_COUNT))?;
        amount_out(factory::DEPLOYED_SAFE_COUNT, out)
    }

    /// Number of proxies deployed by `who`.
    pub fn deployed_proxy_count(&self, ledger: &Ledger, who: Address) -> Result<u128, ExecError> {
        let out = ledger.view(who, self.address, &Call::new(factory::DEPLOYED_PROXY_COUNT))?;
        amount_out(factory::DEPLOYED_PROXY_COUNT, out)
    }

    /// The default implementation for new proxies.
    pub fn implementation(&self, ledger: &Ledger) -> Result<Address, ExecError> {
        let out = ledger.view(Address::ZERO, self.address, &Call::new(factory::IMPLEMENTATION))?;
        address_out(factory::IMPLEMENTATION, out)
    }

    /// The factory owner.
    pub fn owner(&self, ledger: &Ledger) -> Result<Address, ExecError> {
        let out = ledger.view(Address::ZERO, self.address, &Call::new(factory::OWNER))?;
        address_out(factory::OWNER, out)
    }
}

// ---------------------------------------------------------------------------
// TokenClient
// ---------------------------------------------------------------------------

/// Client for a [`FungibleToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenClient {
    address: Address,
}

impl TokenClient {
    /// A client for the token at `address`.
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    /// Deploys a token minting `supply` to `from`.
    pub fn deploy(ledger: &mut Ledger, from: Address, supply: u128) -> Result<Self, ExecError> {
        let address = ledger.deploy(from, Arc::new(FungibleToken), &[Word::Amount(supply)])?;
        Ok(Self::at(address))
    }

    /// The contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Moves `amount` from `from` to `to`.
    pub fn transfer(&self, ledger: &mut Ledger, from: Address, to: Address, amount: u128) -> Result<Receipt, ExecError> {
        ledger.transact(from, self.address, Call::new(token::TRANSFER).arg(to).arg(amount))
    }

    /// Lets `spender` move up to `amount` of `from`'s tokens.
    pub fn approve(
        &self,
        ledger: &mut Ledger,
        from: Address,
        spender: Address,
        amount: u128,
    ) -> Result<Receipt, ExecError> {
        ledger.transact(from, self.address, Call::new(token::APPROVE).arg(spender).arg(amount))
    }

    /// Mints `amount` to `to`. Token owner only.
    pub fn mint(&self, ledger: &mut Ledger, from: Address, to: Address, amount: u128) -> Result<Receipt, ExecError> {
        ledger.transact(from, self.address, Call::new(token::MINT).arg(to).arg(amount))
    }

    /// `holder`'s balance.
    pub fn balance_of(&self, ledger: &Ledger, holder: Address) -> Result<u128, ExecError> {
        let out = ledger.view(holder, self.address, &Call::new(token::BALANCE_OF).arg(holder))?;
        amount_out(token::BALANCE_OF, out)
    }

    /// What `spender` may still move on `holder`'s behalf.
    pub fn allowance(&self, ledger: &Ledger, holder: Address, spender: Address) -> Result<u128, ExecError> {
        let out = ledger.view(
            holder,
            self.address,
            &Call::new(token::ALLOWANCE).arg(holder).arg(spender),
        )?;
        amount_out(token::ALLOWANCE, out)
    }

    /// Total supply.
    pub fn total_supply(&self, ledger: &Ledger) -> Result<u128, ExecError> {
        let out = ledger.view(Address::ZERO, self.address, &Call::new(token::TOTAL_SUPPLY))?;
        amount_out(token::TOTAL_SUPPLY, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoding_rejects_wrong_word() {
        let err = amount_out("owner", Some(Word::Flag(true))).unwrap_err();
        assert_eq!(
            err,
            ExecError::UnexpectedReturn {
                selector: "owner".to_string(),
                expected: "amount"
            }
        );
        assert!(address_out("x", None).is_err());
        assert!(flag_out("x", Some(Word::Flag(false))).is_ok());
    }

    #[test]
    fn clients_round_trip_through_ledger() {
        let mut ledger = Ledger::new();
        let alice = Address::from_label("alice");
        let token = TokenClient::deploy(&mut ledger, alice, 1_000).unwrap();
        let safe = SafeClient::deploy(&mut ledger, alice, Some(alice)).unwrap();

        token.approve(&mut ledger, alice, safe.address(), 1_000).unwrap();
        assert_eq!(token.allowance(&ledger, alice, safe.address()).unwrap(), 1_000);
        safe.deposit(&mut ledger, alice, token.address(), 1_000).unwrap();

        assert_eq!(safe.balance_of(&ledger, alice, token.address()).unwrap(), 1_000);
        assert_eq!(token.balance_of(&ledger, safe.address()).unwrap(), 1_000);
        assert_eq!(safe.withdraw(&mut ledger, alice, token.address(), 1_000).unwrap(), 999);
        assert_eq!(safe.take_fee(&mut ledger, alice, token.address()).unwrap(), 1);
        assert_eq!(token.balance_of(&ledger, alice).unwrap(), 1_000);
        assert_eq!(token.total_supply(&ledger).unwrap(), 1_000);
    }
}
