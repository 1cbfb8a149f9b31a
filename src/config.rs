//! Configuration types for queuevisor.
//!
//! Two layers exist:
//!
//! - [`RunConfig`] - the immutable record built once from the command line
//! - [`Settings`] / [`Profile`] - per-environment runtime profiles loaded from
//!   `~/.queuevisor/config.toml` (or the file named by `QUEUEVISOR_CONFIG`)
//!
//! # Example Configuration
//!
//! ```toml
//! [environments.production]
//! spool_dir = "/var/spool/queuevisor"
//! log_format = "json"
//! log_level = "info"
//! empty_backoff_ms = 1000
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::{CONFIG_PATH_ENV, DEFAULT_EMPTY_BACKOFF_MS, HOME_DIR_NAME};
use crate::error::{Error, Result};
use crate::logging::LogFormat;

/// Immutable run configuration, created once at startup from CLI input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Queue whose consumer logic every worker runs.
    pub queue_name: String,
    /// Number of worker processes, at least one.
    pub worker_count: u32,
    /// Detach from the controlling terminal before launching workers.
    pub detach: bool,
    /// Where stdout/stderr go once detached.
    pub log_path: Option<PathBuf>,
    /// Where the supervisor records its pid.
    pub pidfile_path: Option<PathBuf>,
    /// Runtime profile name.
    pub environment: String,
}

impl RunConfig {
    /// Build a run configuration, rejecting a zero worker count.
    pub fn new(
        queue_name: impl Into<String>,
        worker_count: u32,
        environment: impl Into<String>,
    ) -> Result<Self> {
        if worker_count == 0 {
            return Err(Error::Config("worker count must be at least 1".to_string()));
        }
        Ok(Self {
            queue_name: queue_name.into(),
            worker_count,
            detach: false,
            log_path: None,
            pidfile_path: None,
            environment: environment.into(),
        })
    }

    /// Run detached, optionally sending output to `log_path`.
    #[must_use]
    pub fn detached(mut self, detach: bool, log_path: Option<PathBuf>) -> Self {
        self.detach = detach;
        self.log_path = log_path;
        self
    }

    /// Track the supervisor pid in `path`.
    #[must_use]
    pub fn with_pidfile(mut self, path: Option<PathBuf>) -> Self {
        self.pidfile_path = path;
        self
    }
}

/// All environment profiles from the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Profiles keyed by environment name.
    pub environments: BTreeMap<String, Profile>,
}

/// Runtime settings for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Root directory of the spool queues.
    pub spool_dir: PathBuf,
    /// Log output format.
    pub log_format: LogFormat,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
    /// Upper bound of the randomized sleep after an empty poll.
    pub empty_backoff_ms: u64,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            spool_dir: home_dir().join("spool"),
            log_format: LogFormat::default(),
            log_level: "info".to_string(),
            empty_backoff_ms: DEFAULT_EMPTY_BACKOFF_MS,
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().map_or_else(
        || PathBuf::from(HOME_DIR_NAME),
        |home| home.join(HOME_DIR_NAME),
    )
}

impl Settings {
    /// Load settings from `QUEUEVISOR_CONFIG` or `~/.queuevisor/config.toml`.
    ///
    /// If the file doesn't exist, returns default settings.
    /// If the file exists but is invalid, returns an error.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading config {}", path.display()), e))?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| home_dir().join("config.toml"), PathBuf::from)
    }

    /// Resolve the profile for `environment`, falling back to defaults.
    pub fn profile(&self, environment: &str) -> Profile {
        if let Some(profile) = self.environments.get(environment) {
            return profile.clone();
        }
        if !self.environments.is_empty() {
            tracing::warn!(
                environment = %environment,
                known = ?self.environments.keys().collect::<Vec<_>>(),
                "Environment not configured, using defaults"
            );
        }
        Profile::default()
    }
}
