//! Structured logging with tracing
//!
//! Installs a global `tracing` subscriber for hosts that do not bring their
//! own. The bus itself only emits events through the `tracing` macros.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable holding an `EnvFilter` directive that overrides the
/// configured level.
pub const LOG_ENV: &str = "BUS_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
    pub level: String,
    /// Emit JSON lines instead of human readable output.
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level: {0}. Use trace, debug, info, warn, or error")]
    InvalidLevel(String),
    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Initialize logging with the provided configuration.
///
/// Fails instead of panicking when a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let level = parse_log_level(&config.level)?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| level_filter(level));
    let registry = Registry::default().with(filter);

    // The layer types differ, so each format gets its own branch.
    let installed = if config.json_format {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_names(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_names(true))
            .try_init()
    };
    installed.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    info!("Logging initialized with level: {}", level);
    Ok(())
}

/// Filter for a parsed level. Aliases such as "warning" are not valid
/// filter directives, so the filter is never built from the raw string.
fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::new(LevelFilter::from_level(level).to_string())
}

/// Parse log level string to tracing Level
pub fn parse_log_level(level: &str) -> Result<Level, LoggingError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}
