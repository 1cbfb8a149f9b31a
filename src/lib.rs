// =============================================================================
// Lint Configuration
// =============================================================================

// Safety: unsafe only in the worker pre-exec hook; forking and signals
// otherwise go through daemonize and nix
#![deny(unsafe_code)]
// Correctness: Must handle all fallible operations
#![deny(unused_must_use)]
// Quality: Pedantic but pragmatic
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]
// Allowed with documented reasons
#![allow(clippy::missing_errors_doc)] // Error returns self-documenting via type
#![allow(clippy::missing_panics_doc)] // Panics documented in main entry points
#![allow(clippy::module_name_repetitions)] // e.g., worker::WorkerLoop is clearer
#![allow(clippy::doc_markdown)] // Too many false positives in code docs
#![allow(clippy::must_use_candidate)] // Not all returned values need annotation

//! Library crate for queuevisor - a supervisor that drains one named work
//! queue with N worker processes.
//!
//! The binary wires these pieces together:
//!
//! 1. [`daemon::prepare`] checks the pidfile and detaches
//! 2. [`Supervisor`] records its pid, re-executes the binary once per worker
//!    and coordinates the two-phase stop protocol from [`shutdown`]
//! 3. each worker runs [`worker::run`], draining a [`queue::QueueHandle`]
//!    opened from the [`QueueRegistry`]
//!
//! # Example
//!
//! ```no_run
//! use queuevisor::{Launcher, QueueRegistry, RunConfig, Supervisor};
//!
//! # fn example() -> queuevisor::Result<()> {
//! let registry = QueueRegistry::builtin();
//! let config = RunConfig::new("echo", 4, "production")?;
//! registry.ensure(&config.queue_name)?;
//!
//! let pidfile = queuevisor::daemon::prepare(&config)?;
//! let exit = Supervisor::new(Launcher::for_queue(&config)?, config.worker_count)
//!     .run_blocking(pidfile)?;
//! std::process::exit(i32::from(exit.exit_code()));
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod queue;
pub mod shutdown;
pub mod supervisor;
pub mod worker;

pub use config::{Profile, RunConfig, Settings};
pub use error::{Error, Result};
pub use logging::{LogConfig, LogFormat, init_logging};
pub use queue::{Outcome, QueueContext, QueueHandle, QueueRegistry};
pub use shutdown::{StopFlag, StopMode};
pub use supervisor::{Launcher, Supervisor, SupervisorExit};
pub use worker::WorkerExit;
