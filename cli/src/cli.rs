//! # CLI Interface
//!
//! Defines the command-line argument structure for `simplesafe` using
//! `clap` derive. Supports three subcommands: `run`, `demo` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use simplesafe_ledger::config::MAX_CALL_DEPTH;

/// SimpleSafe scenario simulator.
///
/// Runs scripted sequences of deployments and transactions against a fresh
/// in-memory ledger and prints a JSON report of every step and the final
/// state root.
#[derive(Parser, Debug)]
#[command(
    name = "simplesafe",
    about = "SimpleSafe scenario simulator",
    version,
    propagate_version = true
)]
pub struct SimpleSafeCli {
    /// Level for the simulator's own crates, or a full filter directive
    /// list. Ignored when `RUST_LOG` is set.
    #[arg(long, global = true, env = "SIMPLESAFE_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "SIMPLESAFE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a JSON scenario script.
    Run(RunArgs),
    /// Run the built-in demonstration script.
    Demo(DemoArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the scenario script.
    pub script: PathBuf,

    /// Maximum call nesting depth for the ledger.
    #[arg(long, default_value_t = MAX_CALL_DEPTH)]
    pub max_call_depth: usize,

    /// Print the report on a single line.
    #[arg(long)]
    pub compact: bool,
}

/// Arguments for the `demo` subcommand.
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Print the demo script itself instead of running it.
    #[arg(long)]
    pub print_script: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        SimpleSafeCli::command().debug_assert();
    }

    #[test]
    fn run_takes_script_path_and_depth() {
        let cli = SimpleSafeCli::try_parse_from([
            "simplesafe",
            "run",
            "scenario.json",
            "--max-call-depth",
            "64",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.script, PathBuf::from("scenario.json"));
                assert_eq!(args.max_call_depth, 64);
                assert!(!args.compact);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn log_flags_are_global() {
        let cli =
            SimpleSafeCli::try_parse_from(["simplesafe", "demo", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, "json");
        assert!(matches!(cli.command, Commands::Demo(_)));
    }
}
