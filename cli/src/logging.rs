//! # Structured Logging
//!
//! Installs a `tracing` subscriber that writes to stderr, keeping stdout for
//! the scenario report so it can be piped into `jq` or a file.
//!
//! `--log-level` takes either a bare level, applied to the simulator's own
//! crates while everything else stays at `warn`, or a full `EnvFilter`
//! directive list. `RUST_LOG` overrides both.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log targets of the simulator's own crates.
const OWN_TARGETS: &[&str] = &["simplesafe", "simplesafe_ledger", "simplesafe_contracts"];

/// Level for targets outside [`OWN_TARGETS`].
const FOREIGN_LEVEL: &str = "warn";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored output.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// `"json"` (any case) selects JSON; anything else is pretty.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Expands `level` into a filter directive list.
///
/// A value that already names targets (contains `=` or `,`) is used as is.
fn filter_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }

    let mut directives = vec![FOREIGN_LEVEL.to_string()];
    directives.extend(OWN_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

/// Installs the global subscriber. Call once, early in `main()`.
pub fn init_logging(level: &str, format: LogFormat) {
    let directives = filter_directives(level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer.with_file(false))
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer.json())
                .init();
        }
    }

    tracing::debug!(?format, %directives, "logging initialized");
}
