//! # Scenario Scripts
//!
//! A script is a JSON document listing steps to run, in order, against a
//! fresh ledger. Each step names its operation in an `op` field:
//!
//! ```json
//! {
//!   "name": "round trip",
//!   "steps": [
//!     { "op": "deploy_token", "label": "X", "from": "issuer", "supply": 1000000 },
//!     { "op": "deploy_safe", "label": "vault", "from": "owner", "owner": "owner" },
//!     { "op": "withdraw", "safe": "vault", "from": "alice", "token": "X", "amount": 50,
//!       "expect_failure": "insufficient_balance" }
//!   ]
//! }
//! ```
//!
//! Identities are plain strings. A string bound by an earlier deploy step
//! resolves to the deployed contract; a `0x`-prefixed hex string is taken
//! literally; anything else is hashed into a stable externally owned
//! address, so `"alice"` is the same account in every step.
//!
//! A step carrying `expect_failure` must fail with an error of that kind.
//! The expected failure is recorded and the script continues; any other
//! outcome aborts the run.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use simplesafe_contracts::{FactoryClient, ProxyClient, SafeClient, TokenClient};
use simplesafe_ledger::{Address, ErrorKind, ExecError, Ledger, LedgerConfig, Word};

/// The built-in demonstration script.
pub const DEMO_SCRIPT: &str = include_str!("../scenarios/demo.json");

// ---------------------------------------------------------------------------
// Script format
// ---------------------------------------------------------------------------

/// A parsed scenario script.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Free-form name, echoed in the report.
    #[serde(default)]
    pub name: String,
    /// Steps, run in order.
    pub steps: Vec<Step>,
}

impl Script {
    /// Parses a script from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid scenario script")
    }

    /// Reads and parses the script at `path`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// The built-in demo.
    pub fn demo() -> Result<Self> {
        Self::from_json(DEMO_SCRIPT)
    }
}

/// One step: an operation plus an optional expected failure.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// What to do.
    #[serde(flatten)]
    pub op: Op,
    /// If set, the step must fail with an error of this kind.
    #[serde(default)]
    pub expect_failure: Option<ErrorKind>,
}

/// Script operations. Amounts are `u64` on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Deploy a token minting `supply` to `from`.
    DeployToken { label: String, from: String, supply: u64 },
    /// Deploy a Safe directly; without `owner` it starts uninitialized.
    DeploySafe {
        label: String,
        from: String,
        #[serde(default)]
        owner: Option<String>,
    },
    /// Deploy an uninitialized Safe to serve as a proxy implementation.
    DeployImplementation { label: String, from: String },
    /// Deploy a proxy.
    DeployProxy {
        label: String,
        from: String,
        implementation: String,
        admin: String,
    },
    /// Deploy a factory owned by `from`.
    DeployFactory {
        label: String,
        from: String,
        implementation: String,
    },
    /// Have `factory` deploy a Safe for `from`.
    FactoryDeploySafe {
        label: String,
        factory: String,
        from: String,
    },
    /// Have `factory` deploy a Safe proxy for `from`, optionally initialized.
    FactoryDeployProxy {
        label: String,
        factory: String,
        from: String,
        #[serde(default)]
        initialize: bool,
    },
    /// Move the factory's default implementation.
    UpdateImplementation {
        factory: String,
        from: String,
        implementation: String,
    },
    /// Repoint a proxy.
    Upgrade {
        proxy: String,
        from: String,
        implementation: String,
    },
    /// Token transfer.
    Transfer {
        token: String,
        from: String,
        to: String,
        amount: u64,
    },
    /// Token approval.
    Approve {
        token: String,
        from: String,
        spender: String,
        amount: u64,
    },
    /// Assign a Safe's owner.
    Initialize {
        safe: String,
        from: String,
        owner: String,
    },
    /// Deposit into a Safe.
    Deposit {
        safe: String,
        from: String,
        token: String,
        amount: u64,
    },
    /// Withdraw from a Safe.
    Withdraw {
        safe: String,
        from: String,
        token: String,
        amount: u64,
    },
    /// Sweep a Safe's accrued tax.
    TakeFee {
        safe: String,
        from: String,
        token: String,
    },
    /// Check a token balance.
    AssertTokenBalance {
        token: String,
        holder: String,
        equals: u64,
    },
    /// Check a depositor's balance inside a Safe.
    AssertVaultBalance {
        safe: String,
        token: String,
        holder: String,
        equals: u64,
    },
    /// Check a Safe's accrued tax.
    AssertTotalTax {
        safe: String,
        token: String,
        equals: u64,
    },
    /// Check a proxy's implementation.
    AssertImplementation { proxy: String, equals: String },
}

impl Op {
    /// The `op` tag, for reports and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Op::DeployToken { .. } => "deploy_token",
            Op::DeploySafe { .. } => "deploy_safe",
            Op::DeployImplementation { .. } => "deploy_implementation",
            Op::DeployProxy { .. } => "deploy_proxy",
            Op::DeployFactory { .. } => "deploy_factory",
            Op::FactoryDeploySafe { .. } => "factory_deploy_safe",
            Op::FactoryDeployProxy { .. } => "factory_deploy_proxy",
            Op::UpdateImplementation { .. } => "update_implementation",
            Op::Upgrade { .. } => "upgrade",
            Op::Transfer { .. } => "transfer",
            Op::Approve { .. } => "approve",
            Op::Initialize { .. } => "initialize",
            Op::Deposit { .. } => "deposit",
            Op::Withdraw { .. } => "withdraw",
            Op::TakeFee { .. } => "take_fee",
            Op::AssertTokenBalance { .. } => "assert_token_balance",
            Op::AssertVaultBalance { .. } => "assert_vault_balance",
            Op::AssertTotalTax { .. } => "assert_total_tax",
            Op::AssertImplementation { .. } => "assert_implementation",
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The step succeeded.
    Ok,
    /// The step failed with the expected kind of error.
    FailedAsExpected,
}

/// Per-step entry of the report.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Zero-based step index.
    pub index: usize,
    /// The step's `op` tag.
    pub op: &'static str,
    /// What happened.
    pub status: Status,
    /// Value returned by a successful step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Word>,
    /// Kind of the expected failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Message of the expected failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The result of running a whole script.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Script name.
    pub name: String,
    /// One entry per step.
    pub steps: Vec<StepReport>,
    /// Every label bound by a deploy step.
    pub labels: BTreeMap<String, Address>,
    /// Committed transactions and deployments.
    pub transactions: u64,
    /// Hex-encoded state root after the last step.
    pub state_root: String,
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Label bindings made by deploy steps.
#[derive(Debug, Clone, Default)]
struct Labels(BTreeMap<String, Address>);

impl Labels {
    fn resolve(&self, label: &str) -> Address {
        if let Some(address) = self.0.get(label) {
            return *address;
        }
        label
            .parse::<Address>()
            .unwrap_or_else(|_| Address::from_label(label))
    }

    fn bind(&mut self, label: &str, address: Address) -> Result<Option<Word>> {
        if self.0.contains_key(label) {
            bail!("label '{label}' is already bound");
        }
        self.0.insert(label.to_string(), address);
        tracing::debug!(label, %address, "label bound");
        Ok(Some(Word::Address(address)))
    }
}

/// Runs scripts against a ledger it owns.
#[derive(Debug, Default)]
pub struct Runner {
    ledger: Ledger,
    labels: Labels,
}

impl Runner {
    /// A runner over an empty ledger with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner over an empty ledger with `config`.
    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            ledger: Ledger::with_config(config),
            labels: Labels::default(),
        }
    }

    /// Read access to the underlying ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Runs every step of `script`.
    ///
    /// # Errors
    ///
    /// The first step that fails unexpectedly, succeeds when it was expected
    /// to fail, or fails with a different kind than expected.
    pub fn run(&mut self, script: &Script) -> Result<Report> {
        let mut steps = Vec::with_capacity(script.steps.len());

        for (index, step) in script.steps.iter().enumerate() {
            let op = step.op.name();
            let report = match (self.apply(&step.op), step.expect_failure) {
                (Ok(output), None) => {
                    tracing::info!(index, op, "step ok");
                    StepReport {
                        index,
                        op,
                        status: Status::Ok,
                        output,
                        kind: None,
                        error: None,
                    }
                }
                (Ok(_), Some(expected)) => {
                    bail!("step {index} ({op}) succeeded but was expected to fail with {expected:?}")
                }
                (Err(err), expected) => {
                    let kind = err.downcast_ref::<ExecError>().map(ExecError::kind);
                    match (kind, expected) {
                        (Some(kind), Some(expected)) if kind == expected => {
                            tracing::info!(index, op, ?kind, "step failed as expected");
                            StepReport {
                                index,
                                op,
                                status: Status::FailedAsExpected,
                                output: None,
                                kind: Some(kind),
                                error: Some(err.to_string()),
                            }
                        }
                        (_, Some(expected)) => {
                            return Err(err.context(format!(
                                "step {index} ({op}) was expected to fail with {expected:?}"
                            )))
                        }
                        (_, None) => return Err(err.context(format!("step {index} ({op}) failed"))),
                    }
                }
            };
            steps.push(report);
        }

        Ok(Report {
            name: script.name.clone(),
            steps,
            labels: self.labels.0.clone(),
            transactions: self.ledger.sequence(),
            state_root: hex::encode(self.ledger.state_root()),
        })
    }

    fn apply(&mut self, op: &Op) -> Result<Option<Word>> {
        let Runner { ledger, labels } = self;
        match op {
            Op::DeployToken {
                label,
                from,
                supply,
            } => {
                let token = TokenClient::deploy(ledger, labels.resolve(from), u128::from(*supply))?;
                labels.bind(label, token.address())
            }
            Op::DeploySafe { label, from, owner } => {
                let owner = owner.as_deref().map(|o| labels.resolve(o));
                let safe = SafeClient::deploy(ledger, labels.resolve(from), owner)?;
                labels.bind(label, safe.address())
            }
            Op::DeployImplementation { label, from } => {
                let safe = SafeClient::deploy(ledger, labels.resolve(from), None)?;
                labels.bind(label, safe.address())
            }
            Op::DeployProxy {
                label,
                from,
                implementation,
                admin,
            } => {
                let proxy = ProxyClient::deploy(
                    ledger,
                    labels.resolve(from),
                    labels.resolve(implementation),
                    labels.resolve(admin),
                )?;
                labels.bind(label, proxy.address())
            }
            Op::DeployFactory {
                label,
                from,
                implementation,
            } => {
                let factory =
                    FactoryClient::deploy(ledger, labels.resolve(from), labels.resolve(implementation))?;
                labels.bind(label, factory.address())
            }
            Op::FactoryDeploySafe {
                label,
                factory,
                from,
            } => {
                let safe =
                    FactoryClient::at(labels.resolve(factory)).deploy_safe(ledger, labels.resolve(from))?;
                labels.bind(label, safe.address())
            }
            Op::FactoryDeployProxy {
                label,
                factory,
                from,
                initialize,
            } => {
                let factory = FactoryClient::at(labels.resolve(factory));
                let from = labels.resolve(from);
                let proxy = if *initialize {
                    factory.deploy_initialized_safe_proxy(ledger, from)?
                } else {
                    factory.deploy_safe_proxy(ledger, from)?
                };
                labels.bind(label, proxy.address())
            }
            Op::UpdateImplementation {
                factory,
                from,
                implementation,
            } => {
                let receipt = FactoryClient::at(labels.resolve(factory)).update_implementation(
                    ledger,
                    labels.resolve(from),
                    labels.resolve(implementation),
                )?;
                Ok(receipt.output)
            }
            Op::Upgrade {
                proxy,
                from,
                implementation,
            } => {
                let receipt = ProxyClient::at(labels.resolve(proxy)).upgrade(
                    ledger,
                    labels.resolve(from),
                    labels.resolve(implementation),
                )?;
                Ok(receipt.output)
            }
            Op::Transfer {
                token,
                from,
                to,
                amount,
            } => {
                let receipt = TokenClient::at(labels.resolve(token)).transfer(
                    ledger,
                    labels.resolve(from),
                    labels.resolve(to),
                    u128::from(*amount),
                )?;
                Ok(receipt.output)
            }
            Op::Approve {
                token,
                from,
                spender,
                amount,
            } => {
                let receipt = TokenClient::at(labels.resolve(token)).approve(
                    ledger,
                    labels.resolve(from),
                    labels.resolve(spender),
                    u128::from(*amount),
                )?;
                Ok(receipt.output)
            }
            Op::Initialize { safe, from, owner } => {
                let receipt = SafeClient::at(labels.resolve(safe)).initialize(
                    ledger,
                    labels.resolve(from),
                    labels.resolve(owner),
                )?;
                Ok(receipt.output)
            }
            Op::Deposit {
                safe,
                from,
                token,
                amount,
            } => {
                let receipt = SafeClient::at(labels.resolve(safe)).deposit(
                    ledger,
                    labels.resolve(from),
                    labels.resolve(token),
                    u128::from(*amount),
                )?;
                Ok(receipt.output)
            }
            Op::Withdraw {
                safe,
                from,
                token,
                amount,
            } => {
                let paid = SafeClient::at(labels.resolve(safe)).withdraw(
                    ledger,
                    labels.resolve(from),
                    labels.resolve(token),
                    u128::from(*amount),
                )?;
                Ok(Some(Word::Amount(paid)))
            }
            Op::TakeFee { safe, from, token } => {
                let swept = SafeClient::at(labels.resolve(safe)).take_fee(
                    ledger,
                    labels.resolve(from),
                    labels.resolve(token),
                )?;
                Ok(Some(Word::Amount(swept)))
            }
            Op::AssertTokenBalance {
                token,
                holder,
                equals,
            } => {
                let actual = TokenClient::at(labels.resolve(token)).balance_of(ledger, labels.resolve(holder))?;
                check("token balance", u128::from(*equals), actual)
            }
            Op::AssertVaultBalance {
                safe,
                token,
                holder,
                equals,
            } => {
                let actual = SafeClient::at(labels.resolve(safe)).balance_of(
                    ledger,
                    labels.resolve(holder),
                    labels.resolve(token),
                )?;
                check("vault balance", u128::from(*equals), actual)
            }
            Op::AssertTotalTax {
                safe,
                token,
                equals,
            } => {
                let actual = SafeClient::at(labels.resolve(safe)).total_tax(ledger, labels.resolve(token))?;
                check("total tax", u128::from(*equals), actual)
            }
            Op::AssertImplementation { proxy, equals } => {
                let actual = ProxyClient::at(labels.resolve(proxy)).implementation(ledger)?;
                check("implementation", labels.resolve(equals), actual)
            }
        }
    }
}

fn check<T>(what: &str, expected: T, actual: T) -> Result<Option<Word>>
where
    T: PartialEq + std::fmt::Display + Into<Word>,
{
    if expected != actual {
        bail!("assertion failed: {what}: expected {expected}, got {actual}");
    }
    Ok(Some(actual.into()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn script(steps: &str) -> Script {
        Script::from_json(&format!(r#"{{ "name": "test", "steps": {steps} }}"#)).unwrap()
    }

    #[test]
    fn demo_script_runs_clean() {
        let mut runner = Runner::new();
        let report = runner.run(&Script::demo().unwrap()).unwrap();
        assert_eq!(report.steps.len(), Script::demo().unwrap().steps.len());
        assert!(report
            .steps
            .iter()
            .any(|s| s.status == Status::FailedAsExpected));
        assert_eq!(report.state_root, hex::encode(runner.ledger().state_root()));
        assert_ne!(report.labels["I1"], report.labels["I2"]);
    }

    #[test]
    fn expected_failure_is_recorded() {
        let s = script(
            r#"[
                { "op": "deploy_token", "label": "X", "from": "issuer", "supply": 100 },
                { "op": "deploy_safe", "label": "vault", "from": "owner", "owner": "owner" },
                { "op": "withdraw", "safe": "vault", "from": "alice", "token": "X",
                  "amount": 50, "expect_failure": "insufficient_balance" }
            ]"#,
        );
        let report = Runner::new().run(&s).unwrap();
        let last = &report.steps[2];
        assert_eq!(last.status, Status::FailedAsExpected);
        assert_eq!(last.kind, Some(ErrorKind::InsufficientBalance));
        assert_eq!(report.transactions, 2);
    }

    #[test]
    fn unexpected_success_aborts() {
        let s = script(
            r#"[
                { "op": "deploy_token", "label": "X", "from": "issuer", "supply": 100,
                  "expect_failure": "authorization" }
            ]"#,
        );
        let err = Runner::new().run(&s).unwrap_err();
        assert!(err.to_string().contains("expected to fail"));
    }

    #[test]
    fn wrong_failure_kind_aborts() {
        let s = script(
            r#"[
                { "op": "deploy_safe", "label": "vault", "from": "owner", "owner": "owner" },
                { "op": "initialize", "safe": "vault", "from": "x", "owner": "x",
                  "expect_failure": "authorization" }
            ]"#,
        );
        let err = Runner::new().run(&s).unwrap_err();
        let root = err.root_cause().downcast_ref::<ExecError>();
        assert_eq!(root, Some(&ExecError::AlreadyInitialized));
    }

    #[test]
    fn failed_assertion_aborts() {
        let s = script(
            r#"[
                { "op": "deploy_token", "label": "X", "from": "issuer", "supply": 100 },
                { "op": "assert_token_balance", "token": "X", "holder": "issuer", "equals": 99 }
            ]"#,
        );
        let err = Runner::new().run(&s).unwrap_err();
        assert!(format!("{err:#}").contains("expected 99, got 100"));
    }

    #[test]
    fn labels_cannot_be_rebound() {
        let s = script(
            r#"[
                { "op": "deploy_token", "label": "X", "from": "issuer", "supply": 1 },
                { "op": "deploy_token", "label": "X", "from": "issuer", "supply": 1 }
            ]"#,
        );
        assert!(Runner::new().run(&s).is_err());
    }

    #[test]
    fn hex_labels_resolve_literally() {
        let labels = Labels::default();
        let alice = Address::from_label("alice");
        assert_eq!(labels.resolve(&alice.to_hex()), alice);
        assert_eq!(labels.resolve("alice"), alice);
    }

    #[test]
    fn script_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "steps": [ {{ "op": "deploy_token", "label": "X", "from": "a", "supply": 5 }} ] }}"#
        )
        .unwrap();
        let loaded = Script::from_path(file.path()).unwrap();
        assert_eq!(loaded.steps.len(), 1);
        assert_eq!(loaded.steps[0].op.name(), "deploy_token");
        assert!(loaded.name.is_empty());
    }

    #[test]
    fn unknown_op_is_rejected() {
        assert!(Script::from_json(r#"{ "steps": [ { "op": "selfdestruct" } ] }"#).is_err());
    }
}
