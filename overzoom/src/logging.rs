//! Logging initialization using `tracing` and `tracing-subscriber`.
//!
//! Logging is configured once at startup from two environment variables:
//! - `RUST_LOG`: log level filtering (standard tracing-subscriber behavior)
//! - `OVERZOOM_FORMAT`: output format (compact, full, pretty, json)

use std::io;
use std::str::FromStr;

use tracing::dispatcher::SetGlobalDefaultError;
use tracing::level_filters::LevelFilter;
use tracing::{Dispatch, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Log output format options.
///
/// Controlled by the `OVERZOOM_FORMAT` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, single-line logs.
    Full,
    /// A variant of the full-format, optimized for short line lengths (default).
    Compact,
    /// Multi-line logs for local debugging.
    Pretty,
    /// Newline-delimited JSON logs.
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "compact" => Ok(Self::Compact),
            "pretty" | "verbose" => Ok(Self::Pretty),
            "json" | "jsonl" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid log format '{s}'. Valid options: full, compact, pretty, json"
            )),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("Unable to set the global tracing subscriber: {0}")]
    SubscriberAlreadySet(#[from] SetGlobalDefaultError),

    #[error("Unable to bridge log records into tracing: {0}")]
    LogBridgeAlreadySet(#[from] log::SetLoggerError),
}

/// Install the global tracing subscriber for the given filter and format.
///
/// `log` records are bridged into `tracing`. An invalid filter falls back to
/// `debug`, an invalid format to the default one. Only the first call succeeds.
pub fn init_tracing(filter: &str, format: Option<String>) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::from_str(filter).unwrap_or_else(|_| {
        eprintln!("Warning: Invalid filter string '{filter}' passed, logging everything at debug level");
        EnvFilter::new("debug")
    });
    let max_level = env_filter
        .max_level_hint()
        .and_then(LevelFilter::into_level);

    let format = format
        .and_then(|s| {
            s.parse::<LogFormat>()
                .map_err(|e| {
                    eprintln!("Warning: {e}");
                    eprintln!("Falling back to the default format");
                })
                .ok()
        })
        .unwrap_or_default();
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_span_events(FmtSpan::NONE);
    let registry = Registry::default();
    let dispatch: Dispatch = match format {
        LogFormat::Full => registry.with(fmt_layer.with_filter(env_filter)).into(),
        LogFormat::Compact => registry
            .with(fmt_layer.compact().with_filter(env_filter))
            .into(),
        LogFormat::Pretty => registry
            .with(fmt_layer.pretty().with_filter(env_filter))
            .into(),
        LogFormat::Json => registry.with(fmt_layer.json().with_filter(env_filter)).into(),
    };
    // SubscriberInitExt::init() would also install its own LogTracer
    tracing::dispatcher::set_global_default(dispatch)?;
    init_log_bridge(max_level)?;
    Ok(())
}

fn init_log_bridge(max_level: Option<Level>) -> Result<(), log::SetLoggerError> {
    let mut builder = tracing_log::LogTracer::builder()
        .with_interest_cache(tracing_log::InterestCacheConfig::default());
    if let Some(max_level) = max_level {
        builder = builder.with_max_level(match max_level {
            Level::TRACE => log::LevelFilter::Trace,
            Level::DEBUG => log::LevelFilter::Debug,
            Level::INFO => log::LevelFilter::Info,
            Level::WARN => log::LevelFilter::Warn,
            Level::ERROR => log::LevelFilter::Error,
        });
    }
    builder.init()
}

/// Build the filter string, mirroring the `overzoom=` level onto `overzoom_core`.
///
/// Without `RUST_LOG`, both crates log at `info`.
#[must_use]
pub fn ensure_core_log_level_matches(env_filter: Option<String>, replacement: &str) -> String {
    let Some(rust_log) = env_filter else {
        return format!("{replacement}info,overzoom_core=info");
    };
    if !rust_log.contains(replacement) || rust_log.contains("overzoom_core=") {
        return rust_log;
    }
    match rust_log
        .split(',')
        .find_map(|s| s.strip_prefix(replacement))
    {
        Some(level) => format!("{rust_log},overzoom_core={level}"),
        None => rust_log,
    }
}
