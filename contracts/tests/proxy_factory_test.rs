//! Integration tests for proxies and the factory.
//!
//! These cover the upgrade path end to end: a vault reached through a proxy
//! behaves like a directly deployed one, upgrades keep its state, the admin
//! region cannot be reached from implementation code, and moving the
//! factory's default never touches proxies that already exist.

use std::sync::Arc;

use simplesafe_contracts::{FactoryClient, ProxyClient, SafeClient, TokenClient};
use simplesafe_ledger::{
    Address, AdminSlot, Call, CallContext, Contract, ErrorKind, ExecError, Ledger, Slot, Word,
};

fn user(name: &str) -> Address {
    Address::from_label(name)
}

/// Helper: a ledger with one Safe implementation and a factory defaulting
/// to it, both deployed by `owner`.
fn factory_setup() -> (Ledger, Address, SafeClient, FactoryClient) {
    let mut ledger = Ledger::new();
    let owner = user("factory-owner");
    let implementation = SafeClient::deploy(&mut ledger, owner, None).unwrap();
    let factory = FactoryClient::deploy(&mut ledger, owner, implementation.address()).unwrap();
    (ledger, owner, implementation, factory)
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

#[test]
fn scenario_e_update_only_affects_new_proxies() {
    let (mut ledger, owner, i1, factory) = factory_setup();
    let deployer = user("deployer");

    let p1 = factory.deploy_safe_proxy(&mut ledger, deployer).unwrap();

    let i2 = SafeClient::deploy(&mut ledger, owner, None).unwrap();
    factory
        .update_implementation(&mut ledger, owner, i2.address())
        .unwrap();
    assert_eq!(factory.implementation(&ledger).unwrap(), i2.address());

    let p2 = factory.deploy_safe_proxy(&mut ledger, deployer).unwrap();

    assert_eq!(p1.implementation(&ledger).unwrap(), i1.address());
    assert_eq!(p2.implementation(&ledger).unwrap(), i2.address());
    assert_ne!(i1.address(), i2.address());

    assert_eq!(factory.deployed_proxy(&ledger, deployer, 0).unwrap(), p1.address());
    assert_eq!(factory.deployed_proxy(&ledger, deployer, 1).unwrap(), p2.address());
    assert_eq!(factory.deployed_proxy_count(&ledger, deployer).unwrap(), 2);
}

#[test]
fn failed_update_leaves_default_alone() {
    let (mut ledger, owner, implementation, factory) = factory_setup();
    let i2 = SafeClient::deploy(&mut ledger, owner, None).unwrap();
    let root = ledger.state_root();

    let err = factory
        .update_implementation(&mut ledger, user("mallory"), i2.address())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(factory.implementation(&ledger).unwrap(), implementation.address());
    assert_eq!(ledger.state_root(), root);
}

#[test]
fn deployments_are_tracked_per_deployer() {
    let (mut ledger, _owner, _implementation, factory) = factory_setup();
    let alice = user("alice");
    let bob = user("bob");

    let a0 = factory.deploy_safe(&mut ledger, alice).unwrap();
    let b0 = factory.deploy_safe(&mut ledger, bob).unwrap();
    let a1 = factory.deploy_safe(&mut ledger, alice).unwrap();
    assert_ne!(a0.address(), a1.address());

    assert_eq!(factory.deployed_safe(&ledger, alice, 0).unwrap(), a0.address());
    assert_eq!(factory.deployed_safe(&ledger, alice, 1).unwrap(), a1.address());
    assert_eq!(factory.deployed_safe(&ledger, bob, 0).unwrap(), b0.address());
    assert_eq!(factory.deployed_safe_count(&ledger, alice).unwrap(), 2);
    assert_eq!(factory.deployed_safe_count(&ledger, bob).unwrap(), 1);

    assert_eq!(
        factory.deployed_safe(&ledger, bob, 1).unwrap_err(),
        ExecError::OutOfBounds { index: 1, len: 1 }
    );
    assert_eq!(
        factory.deployed_proxy(&ledger, alice, 0).unwrap_err(),
        ExecError::OutOfBounds { index: 0, len: 0 }
    );

    assert_eq!(a0.owner(&ledger).unwrap(), alice);
    assert_eq!(b0.owner(&ledger).unwrap(), bob);
}

#[test]
fn factory_safes_are_fully_functional() {
    let (mut ledger, _owner, _implementation, factory) = factory_setup();
    let alice = user("alice");
    let token = TokenClient::deploy(&mut ledger, alice, 10_000).unwrap();
    let safe = factory.deploy_safe(&mut ledger, alice).unwrap();

    token.approve(&mut ledger, alice, safe.address(), 4_000).unwrap();
    safe.deposit(&mut ledger, alice, token.address(), 4_000).unwrap();
    assert_eq!(safe.withdraw(&mut ledger, alice, token.address(), 4_000).unwrap(), 3_996);
    assert_eq!(safe.take_fee(&mut ledger, alice, token.address()).unwrap(), 4);
    assert_eq!(token.balance_of(&ledger, alice).unwrap(), 10_000);
}

#[test]
fn uninitialized_proxy_goes_to_first_caller() {
    let (mut ledger, _owner, _implementation, factory) = factory_setup();
    let deployer = user("deployer");
    let proxy = factory.deploy_safe_proxy(&mut ledger, deployer).unwrap();
    let vault = proxy.as_safe();
    assert!(!vault.initialized(&ledger).unwrap());

    let claimer = user("claimer");
    vault.initialize(&mut ledger, claimer, claimer).unwrap();
    assert_eq!(vault.owner(&ledger).unwrap(), claimer);

    let err = vault.initialize(&mut ledger, deployer, deployer).unwrap_err();
    assert_eq!(err, ExecError::AlreadyInitialized);
    assert_eq!(vault.owner(&ledger).unwrap(), claimer);
    // The admin role is separate from vault ownership.
    assert_eq!(proxy.admin(&ledger).unwrap(), deployer);
}

#[test]
fn initialized_proxy_closes_the_race() {
    let (mut ledger, _owner, _implementation, factory) = factory_setup();
    let deployer = user("deployer");
    let proxy = factory
        .deploy_initialized_safe_proxy(&mut ledger, deployer)
        .unwrap();

    let vault = proxy.as_safe();
    assert!(vault.initialized(&ledger).unwrap());
    assert_eq!(vault.owner(&ledger).unwrap(), deployer);
    assert_eq!(
        factory.deployed_proxy(&ledger, deployer, 0).unwrap(),
        proxy.address()
    );
}

// ---------------------------------------------------------------------------
// Proxy
// ---------------------------------------------------------------------------

#[test]
fn proxied_vault_round_trip() {
    let (mut ledger, _owner, implementation, factory) = factory_setup();
    let alice = user("alice");
    let token = TokenClient::deploy(&mut ledger, alice, 10_000).unwrap();
    let proxy = factory
        .deploy_initialized_safe_proxy(&mut ledger, alice)
        .unwrap();
    let vault = proxy.as_safe();

    token.approve(&mut ledger, alice, vault.address(), 4_000).unwrap();
    vault.deposit(&mut ledger, alice, token.address(), 4_000).unwrap();
    assert_eq!(vault.withdraw(&mut ledger, alice, token.address(), 4_000).unwrap(), 3_996);
    assert_eq!(vault.total_tax(&ledger, token.address()).unwrap(), 4);

    // Tokens sit with the proxy; the implementation holds nothing.
    assert_eq!(token.balance_of(&ledger, proxy.address()).unwrap(), 4);
    assert_eq!(token.balance_of(&ledger, implementation.address()).unwrap(), 0);
    assert_eq!(implementation.total_tax(&ledger, token.address()).unwrap(), 0);

    assert_eq!(vault.take_fee(&mut ledger, alice, token.address()).unwrap(), 4);
}

#[test]
fn upgrade_keeps_balances() {
    let mut ledger = Ledger::new();
    let admin = user("admin");
    let alice = user("alice");
    let token = TokenClient::deploy(&mut ledger, alice, 10_000).unwrap();
    let v1 = SafeClient::deploy(&mut ledger, admin, None).unwrap();
    let proxy = ProxyClient::deploy(&mut ledger, admin, v1.address(), admin).unwrap();
    let vault = proxy.as_safe();
    vault.initialize(&mut ledger, admin, admin).unwrap();

    token.approve(&mut ledger, alice, vault.address(), 6_000).unwrap();
    vault.deposit(&mut ledger, alice, token.address(), 6_000).unwrap();

    let v2 = SafeClient::deploy(&mut ledger, admin, None).unwrap();
    proxy.upgrade(&mut ledger, admin, v2.address()).unwrap();
    assert_eq!(proxy.implementation(&ledger).unwrap(), v2.address());

    assert_eq!(vault.balance_of(&ledger, alice, token.address()).unwrap(), 6_000);
    assert_eq!(vault.owner(&ledger).unwrap(), admin);
    assert_eq!(vault.withdraw(&mut ledger, alice, token.address(), 6_000).unwrap(), 5_994);
}

#[test]
fn non_admin_upgrade_is_rejected_without_effect() {
    let (mut ledger, _owner, implementation, factory) = factory_setup();
    let deployer = user("deployer");
    let proxy = factory.deploy_safe_proxy(&mut ledger, deployer).unwrap();
    let other = SafeClient::deploy(&mut ledger, deployer, None).unwrap();
    let root = ledger.state_root();

    let err = proxy
        .upgrade(&mut ledger, user("mallory"), other.address())
        .unwrap_err();
    assert_eq!(
        err,
        ExecError::Unauthorized {
            caller: user("mallory"),
            role: "admin"
        }
    );
    assert_eq!(proxy.implementation(&ledger).unwrap(), implementation.address());
    assert_eq!(ledger.state_root(), root);
}

/// Implementation logic that writes to every slot it can name, then
/// reports what the proxy's admin region holds.
struct Scribbler;

impl Contract for Scribbler {
    fn name(&self) -> &'static str {
        "Scribbler"
    }

    fn execute(&self, ctx: &mut CallContext<'_>, call: &Call) -> Result<Option<Word>, ExecError> {
        match call.selector.as_str() {
            "scribble" => {
                let junk = Address::from_label("junk");
                for label in ["implementation", "admin", "proxy.implementation", "proxy.admin"] {
                    ctx.storage_mut().set(Slot::named(label), junk);
                }
                Ok(None)
            }
            "peek" => ctx.admin(AdminSlot::Implementation),
            "hijack" => {
                let evil = Address::from_label("evil");
                let caller = ctx.caller();
                ctx.set_admin(AdminSlot::Implementation, evil)?;
                ctx.set_admin(AdminSlot::Admin, caller)?;
                Ok(None)
            }
            "implementation" => Ok(Some(Word::Address(Address::from_label("junk")))),
            other => Err(ExecError::UnknownSelector {
                contract: "Scribbler",
                selector: other.to_string(),
            }),
        }
    }
}

#[test]
fn implementation_cannot_clobber_proxy_slots() {
    let mut ledger = Ledger::new();
    let admin = user("admin");
    let scribbler = ledger.deploy(admin, Arc::new(Scribbler), &[]).unwrap();
    let proxy = ProxyClient::deploy(&mut ledger, admin, scribbler, admin).unwrap();

    ledger
        .transact(admin, proxy.address(), Call::new("scribble"))
        .unwrap();

    assert_eq!(proxy.implementation(&ledger).unwrap(), scribbler);
    assert_eq!(proxy.admin(&ledger).unwrap(), admin);
    let err = ledger
        .view(admin, proxy.address(), &Call::new("peek"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn forwarded_call_cannot_rewrite_proxy_admin_region() {
    let mut ledger = Ledger::new();
    let admin = user("admin");
    let scribbler = ledger.deploy(admin, Arc::new(Scribbler), &[]).unwrap();
    let proxy = ProxyClient::deploy(&mut ledger, admin, scribbler, admin).unwrap();
    let root = ledger.state_root();

    let err = ledger
        .transact(user("mallory"), proxy.address(), Call::new("hijack"))
        .unwrap_err();
    assert_eq!(
        err,
        ExecError::AdminRegionDenied {
            account: proxy.address(),
            code: scribbler,
        }
    );
    assert_eq!(err.kind(), ErrorKind::Authorization);

    assert_eq!(proxy.implementation(&ledger).unwrap(), scribbler);
    assert_eq!(proxy.admin(&ledger).unwrap(), admin);
    assert_eq!(ledger.state_root(), root);

    // The admin cannot route around the check either.
    let err = ledger
        .transact(admin, proxy.address(), Call::new("hijack"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(proxy.implementation(&ledger).unwrap(), scribbler);
}

#[test]
fn proxy_selectors_shadow_implementation() {
    let mut ledger = Ledger::new();
    let admin = user("admin");
    let scribbler = ledger.deploy(admin, Arc::new(Scribbler), &[]).unwrap();
    let proxy = ProxyClient::deploy(&mut ledger, admin, scribbler, admin).unwrap();

    // Called directly, the implementation answers with its own value.
    let direct = ledger
        .view(admin, scribbler, &Call::new("implementation"))
        .unwrap();
    assert_eq!(direct, Some(Word::Address(user("junk"))));

    // Through the proxy the proxy's own selector wins.
    assert_eq!(proxy.implementation(&ledger).unwrap(), scribbler);
}
