//! Structured logging configuration.
//!
//! All output goes to standard error so it follows the daemon's I/O
//! redirection: once detached, the log file given by `--log` receives the
//! supervisor's and every worker's records.

use serde::Deserialize;
use std::io;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::config::Profile;

/// Logging format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty human-readable output (default for development)
    #[default]
    Pretty,
    /// JSON output for log aggregation
    Json,
    /// Compact single-line output
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format (pretty, json, compact)
    pub format: LogFormat,
    /// Minimum log level
    pub level: Level,
    /// Include target (module path)
    pub with_target: bool,
    /// Emit ANSI colours
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: Level::INFO,
            with_target: true,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// Derive the logging setup from an environment profile.
    ///
    /// An unparseable `log_level` falls back to `info`.
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            format: profile.log_format,
            level: Level::from_str(&profile.log_level).unwrap_or(Level::INFO),
            ..Self::default()
        }
    }

    /// Set the log level.
    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Enable or disable ANSI colours (off when writing to a log file).
    #[must_use]
    pub const fn ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Initialize the global tracing subscriber.
///
/// Should be called once at startup. Respects `RUST_LOG` environment
/// variable for filtering if set. Later calls are ignored.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    match config.format {
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .with_ansi(config.with_ansi)
                    .with_target(config.with_target)
                    .with_writer(io::stderr),
            );
            let _ = tracing::subscriber::set_global_default(subscriber);
        },
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(config.with_target)
                    .with_writer(io::stderr),
            );
            let _ = tracing::subscriber::set_global_default(subscriber);
        },
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .compact()
                    .with_ansi(config.with_ansi)
                    .with_target(config.with_target)
                    .with_writer(io::stderr),
            );
            let _ = tracing::subscriber::set_global_default(subscriber);
        },
    }
}

/// Span wrapping everything a worker process logs.
#[macro_export]
macro_rules! worker_span {
    ($queue:expr, $ordinal:expr) => {
        tracing::info_span!("worker", queue = %$queue, worker = $ordinal)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(matches!(config.format, LogFormat::Pretty));
        assert_eq!(config.level, Level::INFO);
    }

    #[test]
    fn test_log_config_from_profile() {
        let profile = Profile {
            log_format: LogFormat::Json,
            log_level: "debug".to_string(),
            ..Profile::default()
        };
        let config = LogConfig::from_profile(&profile);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, Level::DEBUG);
    }

    #[test]
    fn test_bad_level_falls_back_to_info() {
        let profile = Profile {
            log_level: "chatty".to_string(),
            ..Profile::default()
        };
        assert_eq!(LogConfig::from_profile(&profile).level, Level::INFO);
    }

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::default().level(Level::DEBUG).ansi(false);
        assert_eq!(config.level, Level::DEBUG);
        assert!(!config.with_ansi);
    }
}
