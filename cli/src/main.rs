// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SimpleSafe Simulator
//!
//! Entry point for the `simplesafe` binary. Parses CLI arguments, initializes
//! logging, and runs scenario scripts against a fresh in-memory ledger.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — run a JSON scenario script and print its report
//! - `demo`    — run the built-in demonstration script
//! - `version` — print build version information
//!
//! Reports go to stdout as JSON; logs go to stderr.

mod cli;
mod logging;
mod script;

use anyhow::{Context, Result};
use clap::Parser;

use simplesafe_ledger::LedgerConfig;

use cli::{Commands, SimpleSafeCli};
use logging::LogFormat;
use script::{Report, Runner, Script};

fn main() -> Result<()> {
    let cli = SimpleSafeCli::parse();
    logging::init_logging(&cli.log_level, LogFormat::from_str_lossy(&cli.log_format));

    match cli.command {
        Commands::Run(args) => run_script(args),
        Commands::Demo(args) => run_demo(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Loads and runs a script file.
fn run_script(args: cli::RunArgs) -> Result<()> {
    let script = Script::from_path(&args.script)?;
    tracing::info!(
        script = %args.script.display(),
        steps = script.steps.len(),
        max_call_depth = args.max_call_depth,
        "running scenario"
    );

    let mut runner = Runner::with_config(LedgerConfig {
        max_call_depth: args.max_call_depth,
    });
    let report = runner
        .run(&script)
        .with_context(|| format!("scenario {} failed", args.script.display()))?;
    print_report(&report, args.compact)
}

/// Runs, or prints, the built-in demo.
fn run_demo(args: cli::DemoArgs) -> Result<()> {
    if args.print_script {
        print!("{}", script::DEMO_SCRIPT);
        return Ok(());
    }

    let script = Script::demo()?;
    let report = Runner::new().run(&script).context("demo scenario failed")?;
    print_report(&report, false)
}

fn print_report(report: &Report, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(report)
    } else {
        serde_json::to_string_pretty(report)
    }
    .context("failed to serialize report")?;

    println!("{json}");
    tracing::info!(
        steps = report.steps.len(),
        state_root = %report.state_root,
        "scenario complete"
    );
    Ok(())
}

/// Prints version information for the binary and the fee schedule it runs.
fn print_version() {
    println!("simplesafe {}", env!("CARGO_PKG_VERSION"));
    println!("tax       1/{} of each withdrawal", simplesafe_contracts::TAX_DIVISOR);
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
