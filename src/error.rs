//! Error types for supervisor, worker and lifecycle operations.
//!
//! Every variant here is a condition the operator must see: the process
//! prints it and exits with [`EXIT_FAILURE`](crate::constants::EXIT_FAILURE).
//! Per-message failures are not errors; they travel as
//! [`Outcome`](crate::queue::Outcome) values instead.

use std::path::PathBuf;

/// Result type for queuevisor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Queuevisor errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// `--queue` was not given.
    #[error("missing required --queue argument (use --available-queues to list queues)")]
    MissingQueue,

    /// `--queue` names a queue nobody registered.
    #[error("unknown queue '{name}' (use --available-queues to list queues)")]
    UnknownQueue { name: String },

    /// The pidfile points at a process that is still alive.
    #[error("already running with pid {pid} (pidfile {})", path.display())]
    AlreadyRunning { pid: i32, path: PathBuf },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Detaching from the controlling terminal failed.
    #[error("failed to daemonize: {0}")]
    Daemonize(String),

    /// A worker process could not be started.
    #[error("failed to spawn worker {ordinal}: {source}")]
    Spawn {
        ordinal: u32,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an unknown queue error.
    pub fn unknown_queue(name: impl Into<String>) -> Self {
        Self::UnknownQueue { name: name.into() }
    }
}
