//! Centralized constants for exit codes, timing and environment lookups.
//!
//! Anything the supervisor and its workers must agree on lives here so the
//! two sides of the re-exec boundary cannot drift apart.

// =============================================================================
// Exit Codes
// =============================================================================

/// Normal exit: graceful shutdown, `--help`, `--available-queues`.
pub const EXIT_SUCCESS: u8 = 0;

/// Missing `--queue`, a live pidfile, a fatal worker error or the forceful
/// shutdown path.
pub const EXIT_FAILURE: u8 = 1;

// =============================================================================
// Worker Timing
// =============================================================================

/// Upper bound of the randomized sleep after an empty poll (1 second).
pub const DEFAULT_EMPTY_BACKOFF_MS: u64 = 1000;

/// Slice length used while sleeping so a stop request is noticed quickly.
pub const BACKOFF_SLICE_MS: u64 = 50;

// =============================================================================
// Environment
// =============================================================================

/// Environment variable naming an alternate configuration file.
pub const CONFIG_PATH_ENV: &str = "QUEUEVISOR_CONFIG";

/// Environment variable supplying the default `--environment`.
pub const ENVIRONMENT_ENV: &str = "QUEUEVISOR_ENV";

/// Profile used when neither `--environment` nor `QUEUEVISOR_ENV` is given.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Directory under the home directory holding config and spool data.
pub const HOME_DIR_NAME: &str = ".queuevisor";

/// Hidden flag the supervisor passes to re-executed worker processes.
pub const WORKER_FLAG: &str = "--worker";
