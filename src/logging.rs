//! Tracing setup for the console.
//!
//! Events go to stderr so that command output on stdout stays clean. The
//! filter defaults to the configured level; `RUST_LOG` overrides it.
//!
//! # Example
//! ```no_run
//! use inserv_manager::{config::AppConfig, logging};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = AppConfig::load(None)?;
//! logging::init(&config.logging)?;
//! tracing::info!("Console started");
//! # Ok(())
//! # }
//! ```

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::{LogFormat, LoggingConfig};

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Emit span open/close events
    pub with_span_events: bool,
    /// Include file and line numbers
    pub with_file_and_line: bool,
    /// Enable ANSI colors (pretty format only)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            with_span_events: false,
            with_file_and_line: false,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// Tracing options from the `[logging]` section.
    pub fn from_logging_config(config: &LoggingConfig) -> Result<Self> {
        Ok(Self {
            level: parse_log_level(&config.level)?,
            format: config.format,
            // File/line only pays off in the verbose developer format
            with_file_and_line: config.format == LogFormat::Pretty,
            ..Default::default()
        })
    }
}

/// Initialize tracing from the `[logging]` section.
pub fn init(config: &LoggingConfig) -> Result<()> {
    install(TracingConfig::from_logging_config(config)?)
}

/// Install the global subscriber.
///
/// Idempotent: an already installed subscriber is left in place.
pub fn install(config: TracingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(span_events)
        .with_file(config.with_file_and_line)
        .with_line_number(config.with_file_and_line);

    let layer = match config.format {
        LogFormat::Pretty => base.pretty().with_ansi(config.with_ansi).boxed(),
        LogFormat::Compact => base.compact().with_ansi(false).boxed(),
        LogFormat::Json => base.json().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter))
        .try_init()
        .or_else(|e| {
            // Expected in tests and when embedding the console
            if e.to_string().contains("a global default trace dispatcher has already been set") {
                Ok(())
            } else {
                Err(anyhow!("Failed to initialize tracing: {e}"))
            }
        })
}

/// Parse a log level name, case-insensitively.
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        )),
    }
}
