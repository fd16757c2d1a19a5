//! # Structured Logging
//!
//! Sealing and review events go to stderr through `tracing-subscriber`.
//! Stdout carries only command output (verified proposals, recipient
//! lists), so it can be piped into `jq` untouched.
//!
//! The library and this binary log under the same `council_seal` target
//! (the binary is named `council-seal`), so one directive covers both:
//!
//! ```text
//! RUST_LOG=warn,council_seal=debug council-seal open --proposal-id 7 --key me.json
//! ```

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor `--log-level` is given: our own
/// events at `info`, dependencies only when they warn.
pub const DEFAULT_LOG_FILTER: &str = "warn,council_seal=info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable output for interactive use.
    Pretty,
    /// JSON lines, one event per line, for log aggregation.
    Json,
}

/// `RUST_LOG` if set, otherwise `default_filter`
/// (`--log-level` / `COUNCIL_SEAL_LOG_LEVEL`).
fn build_filter(default_filter: &str) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_filter),
    }
}

/// Install the global subscriber. Call once, before the first event.
///
/// An unparsable `default_filter` falls back to [`DEFAULT_LOG_FILTER`] and
/// says so, rather than silently logging nothing.
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let (env_filter, rejected) = match build_filter(default_filter) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(DEFAULT_LOG_FILTER), Some(e)),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .init(),
    }

    if let Some(e) = rejected {
        tracing::warn!(filter = default_filter, error = %e, "invalid log filter, using default");
    }
}
