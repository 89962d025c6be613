//! # Contracts, Calls and Call Frames
//!
//! A [`Contract`] is stateless logic. All of its state lives in the storage
//! of whichever account it is currently running *for*, which is usually its
//! own account and, under a delegated call, a proxy's.
//!
//! Each invocation gets a [`CallContext`] describing the frame:
//!
//! ```text
//! this    account whose storage the logic reads and writes
//! caller  identity authorization checks compare against
//! code    account whose logic is running
//! ```
//!
//! | entry point | this | caller | code |
//! |---|---|---|---|
//! | transaction from `u` to `c` | `c` | `u` | `c` |
//! | `ctx.call(t, ..)` from `c` | `t` | `c` | `t` |
//! | `ctx.delegate(i, ..)` from `p` | `p` | caller of `p` | `i` |
//!
//! Contracts never hold a borrow of the world across an outbound call; each
//! storage access goes back through the context. That is what lets a
//! reentrant call observe every write made before the call went out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::ExecError;
use crate::state::World;
use crate::storage::{AdminSlot, Storage};
use crate::word::Word;

static EMPTY_STORAGE: Storage = Storage::new();

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Contract logic that can be installed at an address.
pub trait Contract: Send + Sync {
    /// Human-readable contract name, used in logs, errors and the state root.
    fn name(&self) -> &'static str;

    /// Runs once, in the new account's frame, when the contract is created.
    fn construct(&self, _ctx: &mut CallContext<'_>, _args: &[Word]) -> Result<(), ExecError> {
        Ok(())
    }

    /// Handles a call.
    fn execute(&self, ctx: &mut CallContext<'_>, call: &Call) -> Result<Option<Word>, ExecError>;
}

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

/// A message sent to a contract: a selector and positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    /// Operation name.
    pub selector: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Word>,
}

impl Call {
    /// A call with no arguments.
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, word: impl Into<Word>) -> Self {
        self.args.push(word.into());
        self
    }

    /// Decodes argument `index` as an address.
    pub fn address(&self, index: usize) -> Result<Address, ExecError> {
        self.word(index)?
            .as_address()
            .ok_or_else(|| self.bad_arg(index, "expected address"))
    }

    /// Decodes argument `index` as an amount.
    pub fn amount(&self, index: usize) -> Result<u128, ExecError> {
        self.word(index)?
            .as_amount()
            .ok_or_else(|| self.bad_arg(index, "expected amount"))
    }

    /// Builds an `InvalidArgument` error for this call.
    pub fn bad_arg(&self, index: usize, reason: &str) -> ExecError {
        ExecError::InvalidArgument {
            selector: self.selector.clone(),
            index,
            reason: reason.to_string(),
        }
    }

    fn word(&self, index: usize) -> Result<&Word, ExecError> {
        self.args
            .get(index)
            .ok_or_else(|| self.bad_arg(index, "missing"))
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// Identity of one call frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Account whose storage is in scope.
    pub this: Address,
    /// Identity of the caller.
    pub caller: Address,
    /// Account whose code is running.
    pub code: Address,
    /// Nesting depth, zero for the transaction's entry frame.
    pub depth: usize,
}

// ---------------------------------------------------------------------------
// CallContext
// ---------------------------------------------------------------------------

/// Everything a running contract may see and touch.
pub struct CallContext<'w> {
    world: &'w mut World,
    frame: Frame,
    max_depth: usize,
}

impl<'w> CallContext<'w> {
    /// The caller of this frame.
    pub fn caller(&self) -> Address {
        self.frame.caller
    }

    /// The account whose storage this frame operates on.
    pub fn this(&self) -> Address {
        self.frame.this
    }

    /// The account whose code is running.
    pub fn code_address(&self) -> Address {
        self.frame.code
    }

    /// Returns `true` if foreign code is running against `this`.
    pub fn is_delegated(&self) -> bool {
        self.code_address() != self.this()
    }

    /// Logic region of `this`.
    pub fn storage(&self) -> &Storage {
        self.world
            .account(&self.frame.this)
            .map(|a| &a.storage)
            .unwrap_or(&EMPTY_STORAGE)
    }

    /// Mutable logic region of `this`.
    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.world.account_mut(self.frame.this).storage
    }

    /// Reads a reserved admin slot of `this`.
    ///
    /// Only the account's own code may touch its admin region; delegated
    /// frames are refused.
    pub fn admin(&self, slot: AdminSlot) -> Result<Option<Word>, ExecError> {
        self.require_own_code()?;
        Ok(self
            .world
            .account(&self.frame.this)
            .and_then(|a| a.admin.get(&slot).copied()))
    }

    /// Writes a reserved admin slot of `this`. Refused in delegated frames.
    pub fn set_admin(&mut self, slot: AdminSlot, word: impl Into<Word>) -> Result<(), ExecError> {
        self.require_own_code()?;
        let word = word.into();
        let admin = &mut self.world.account_mut(self.frame.this).admin;
        if word.is_zero() {
            admin.remove(&slot);
        } else {
            admin.insert(slot, word);
        }
        Ok(())
    }

    fn require_own_code(&self) -> Result<(), ExecError> {
        if self.is_delegated() {
            return Err(ExecError::AdminRegionDenied {
                account: self.frame.this,
                code: self.frame.code,
            });
        }
        Ok(())
    }

    /// Returns `true` if `address` holds contract code.
    pub fn has_code(&self, address: &Address) -> bool {
        self.world.has_code(address)
    }

    /// Calls `target`. The callee sees `this` as its caller and operates on
    /// its own storage.
    pub fn call(&mut self, target: Address, call: &Call) -> Result<Option<Word>, ExecError> {
        let frame = Frame {
            this: target,
            caller: self.frame.this,
            code: target,
            depth: self.frame.depth + 1,
        };
        run_frame(self.world, frame, call, self.max_depth)
    }

    /// Runs `code`'s logic against `this`'s storage, keeping the current
    /// caller.
    pub fn delegate(&mut self, code: Address, call: &Call) -> Result<Option<Word>, ExecError> {
        let frame = Frame {
            this: self.frame.this,
            caller: self.frame.caller,
            code,
            depth: self.frame.depth + 1,
        };
        run_frame(self.world, frame, call, self.max_depth)
    }

    /// Creates a new contract running `code`, with `this` as deployer.
    pub fn deploy(&mut self, code: Arc<dyn Contract>, args: &[Word]) -> Result<Address, ExecError> {
        create_contract(
            self.world,
            self.frame.this,
            code,
            args,
            self.frame.depth + 1,
            self.max_depth,
        )
    }
}

// ---------------------------------------------------------------------------
// Frame execution
// ---------------------------------------------------------------------------

/// Runs `call` in `frame`.
pub(crate) fn run_frame(
    world: &mut World,
    frame: Frame,
    call: &Call,
    max_depth: usize,
) -> Result<Option<Word>, ExecError> {
    if frame.depth >= max_depth {
        return Err(ExecError::CallDepthExceeded { limit: max_depth });
    }

    let code = world.code(&frame.code).ok_or(ExecError::NoCode(frame.code))?;

    tracing::trace!(
        contract = code.name(),
        selector = %call.selector,
        this = %frame.this,
        caller = %frame.caller,
        depth = frame.depth,
        "executing call"
    );

    let mut ctx = CallContext {
        world,
        frame,
        max_depth,
    };
    code.execute(&mut ctx, call)
}

/// Creates a contract deployed by `deployer`, runs its constructor and
/// returns its address.
pub(crate) fn create_contract(
    world: &mut World,
    deployer: Address,
    code: Arc<dyn Contract>,
    args: &[Word],
    depth: usize,
    max_depth: usize,
) -> Result<Address, ExecError> {
    if depth >= max_depth {
        return Err(ExecError::CallDepthExceeded { limit: max_depth });
    }

    let creator = world.account_mut(deployer);
    let nonce = creator.nonce;
    creator.nonce = nonce.checked_add(1).ok_or(ExecError::Overflow)?;

    let address = Address::derive(&deployer, nonce);
    if world.has_code(&address) {
        return Err(ExecError::AddressCollision(address));
    }
    world.install(address, Arc::clone(&code));

    let frame = Frame {
        this: address,
        caller: deployer,
        code: address,
        depth,
    };
    let mut ctx = CallContext {
        world,
        frame,
        max_depth,
    };
    code.construct(&mut ctx, args)?;

    tracing::debug!(contract = code.name(), %address, %deployer, "contract created");
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Slot;

    /// Records who called it and where it wrote.
    struct Recorder;

    impl Contract for Recorder {
        fn name(&self) -> &'static str {
            "Recorder"
        }

        fn execute(&self, ctx: &mut CallContext<'_>, call: &Call) -> Result<Option<Word>, ExecError> {
            match call.selector.as_str() {
                "record" => {
                    let caller = ctx.caller();
                    ctx.storage_mut().set(Slot::named("last_caller"), caller);
                    Ok(Some(Word::Address(caller)))
                }
                "forward" => {
                    let target = call.address(0)?;
                    ctx.call(target, &Call::new("record"))
                }
                "delegate" => {
                    let code = call.address(0)?;
                    ctx.delegate(code, &Call::new("record"))
                }
                "claim" => {
                    let caller = ctx.caller();
                    ctx.set_admin(AdminSlot::Admin, caller)?;
                    Ok(ctx.admin(AdminSlot::Admin)?)
                }
                "delegate_claim" => {
                    let code = call.address(0)?;
                    ctx.delegate(code, &Call::new("claim"))
                }
                "recurse" => {
                    let this = ctx.this();
                    ctx.call(this, &Call::new("recurse"))
                }
                other => Err(ExecError::UnknownSelector {
                    contract: "Recorder",
                    selector: other.to_string(),
                }),
            }
        }
    }

    fn world_with(addresses: &[Address]) -> World {
        let mut world = World::new();
        for a in addresses {
            world.install(*a, Arc::new(Recorder));
        }
        world
    }

    fn entry(this: Address, caller: Address) -> Frame {
        Frame {
            this,
            caller,
            code: this,
            depth: 0,
        }
    }

    #[test]
    fn call_arguments_decode_by_type() {
        let alice = Address::from_label("alice");
        let call = Call::new("deposit").arg(alice).arg(40u128);
        assert_eq!(call.address(0).unwrap(), alice);
        assert_eq!(call.amount(1).unwrap(), 40);
        assert!(matches!(
            call.amount(0),
            Err(ExecError::InvalidArgument { index: 0, .. })
        ));
        assert!(matches!(
            call.address(2),
            Err(ExecError::InvalidArgument { index: 2, .. })
        ));
    }

    #[test]
    fn regular_call_sees_calling_contract_as_caller() {
        let user = Address::from_label("user");
        let a = Address::from_label("a");
        let b = Address::from_label("b");
        let mut world = world_with(&[a, b]);

        let out = run_frame(&mut world, entry(a, user), &Call::new("forward").arg(b), 16).unwrap();
        assert_eq!(out, Some(Word::Address(a)));
        let stored = world.account(&b).unwrap().storage.address(&Slot::named("last_caller"));
        assert_eq!(stored.unwrap(), a);
    }

    #[test]
    fn delegate_keeps_caller_and_storage_owner() {
        let user = Address::from_label("user");
        let proxy = Address::from_label("proxy");
        let logic = Address::from_label("logic");
        let mut world = world_with(&[proxy, logic]);

        let out = run_frame(
            &mut world,
            entry(proxy, user),
            &Call::new("delegate").arg(logic),
            16,
        )
        .unwrap();
        assert_eq!(out, Some(Word::Address(user)));

        // The write landed in the proxy, not in the logic account.
        let slot = Slot::named("last_caller");
        assert_eq!(world.account(&proxy).unwrap().storage.address(&slot).unwrap(), user);
        assert!(world.account(&logic).unwrap().storage.is_empty());
    }

    #[test]
    fn admin_region_is_reachable_only_from_own_code() {
        let user = Address::from_label("user");
        let proxy = Address::from_label("proxy");
        let logic = Address::from_label("logic");
        let mut world = world_with(&[proxy, logic]);

        let out = run_frame(&mut world, entry(proxy, user), &Call::new("claim"), 16).unwrap();
        assert_eq!(out, Some(Word::Address(user)));

        let mallory = Address::from_label("mallory");
        let err = run_frame(
            &mut world,
            entry(proxy, mallory),
            &Call::new("delegate_claim").arg(logic),
            16,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ExecError::AdminRegionDenied {
                account: proxy,
                code: logic
            }
        );
        assert_eq!(err.kind(), crate::error::ErrorKind::Authorization);
        let stored = world.account(&proxy).unwrap().admin.get(&AdminSlot::Admin).copied();
        assert_eq!(stored, Some(Word::Address(user)));
    }

    #[test]
    fn calling_an_account_without_code_fails() {
        let user = Address::from_label("user");
        let a = Address::from_label("a");
        let nobody = Address::from_label("nobody");
        let mut world = world_with(&[a]);
        let err = run_frame(&mut world, entry(a, user), &Call::new("forward").arg(nobody), 16)
            .unwrap_err();
        assert_eq!(err, ExecError::NoCode(nobody));
    }

    #[test]
    fn runaway_recursion_hits_depth_limit() {
        let user = Address::from_label("user");
        let a = Address::from_label("a");
        let mut world = world_with(&[a]);
        let err = run_frame(&mut world, entry(a, user), &Call::new("recurse"), 8).unwrap_err();
        assert_eq!(err, ExecError::CallDepthExceeded { limit: 8 });
    }

    #[test]
    fn create_derives_address_from_nonce() {
        let deployer = Address::from_label("deployer");
        let mut world = World::new();
        let first = create_contract(&mut world, deployer, Arc::new(Recorder), &[], 0, 16).unwrap();
        let second = create_contract(&mut world, deployer, Arc::new(Recorder), &[], 0, 16).unwrap();
        assert_eq!(first, Address::derive(&deployer, 0));
        assert_eq!(second, Address::derive(&deployer, 1));
        assert_eq!(world.account(&deployer).unwrap().nonce, 2);
        assert!(world.has_code(&first) && world.has_code(&second));
    }
}
