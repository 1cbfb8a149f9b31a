//! Supervisor process: launch N workers, forward stop requests, reap them.
//!
//! The supervisor never touches the queue. Its control loop waits on two
//! things at once, worker exits and stop signals:
//!
//! - worker exit: log it; when no workers remain, return
//! - first stop signal: SIGTERM every live worker and keep reaping
//! - second stop signal: SIGKILL every live worker and return immediately
//!
//! Exited workers are not restarted.
//!
//! ## Module Structure
//!
//! - [`launcher`]: process spawning and the live-worker roster

pub mod launcher;

pub use launcher::{Launcher, Roster, WorkerRecord, WorkerReport};

use std::os::unix::process::ExitStatusExt;

use crate::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::daemon::Pidfile;
use crate::error::{Error, Result};
use crate::shutdown::{Escalation, StopFlag, StopMode, StopSignals, StopSource};

/// How the control loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// Every worker exited on its own or after a graceful stop.
    Drained,
    /// A second stop request arrived; workers were killed.
    Forced,
    /// Not every worker could be started; the rest were stopped.
    LaunchFailed,
}

impl SupervisorExit {
    /// Process exit status for this ending.
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Drained => EXIT_SUCCESS,
            Self::Forced | Self::LaunchFailed => EXIT_FAILURE,
        }
    }
}

/// Launches workers and coordinates their shutdown.
#[derive(Debug)]
pub struct Supervisor {
    launcher: Launcher,
    worker_count: u32,
    stop: StopFlag,
}

impl Supervisor {
    pub fn new(launcher: Launcher, worker_count: u32) -> Self {
        Self {
            launcher,
            worker_count,
            stop: StopFlag::new(),
        }
    }

    /// Run the supervisor on a fresh current-thread runtime.
    ///
    /// Signal handlers are installed before `pidfile` is written and before
    /// the first worker starts, so anyone who can read the pid can also stop
    /// the supervisor cleanly. The pidfile is removed on every return path.
    pub fn run_blocking(self, pidfile: Option<Pidfile>) -> Result<SupervisorExit> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::io("building supervisor runtime", e))?;

        runtime.block_on(async move {
            let mut signals = StopSignals::install()
                .map_err(|e| Error::io("installing signal handlers", e))?;
            let _guard = pidfile.map(Pidfile::claim).transpose()?;
            Ok(self.run(&mut signals).await)
        })
    }

    /// Launch the workers and drive the control loop until it ends.
    pub async fn run<S: StopSource>(self, signals: &mut S) -> SupervisorExit {
        let mut roster = Roster::new();
        tracing::info!(
            pid = std::process::id(),
            workers = self.worker_count,
            "Supervisor starting"
        );

        let launched = self.launcher.launch(self.worker_count, &mut roster);
        if let Err(err) = &launched {
            tracing::error!(
                error = %err,
                started = roster.len(),
                "Launch failed, stopping started workers"
            );
            self.stop.request();
            roster.signal_all(StopMode::Graceful);
        }

        loop {
            tokio::select! {
                report = roster.next_exit() => match report {
                    Some(report) => log_exit(&report, roster.len()),
                    None => break,
                },
                signal = signals.recv() => match self.stop.request() {
                    Escalation::Graceful => {
                        tracing::info!(
                            ?signal,
                            workers = roster.len(),
                            "Stopping workers gracefully"
                        );
                        roster.signal_all(StopMode::Graceful);
                    },
                    Escalation::Forceful => {
                        tracing::warn!(
                            ?signal,
                            workers = roster.len(),
                            "Second stop request, killing workers"
                        );
                        roster.signal_all(StopMode::Forceful);
                        return SupervisorExit::Forced;
                    },
                },
            }
        }

        if launched.is_err() {
            SupervisorExit::LaunchFailed
        } else {
            tracing::info!("All workers exited");
            SupervisorExit::Drained
        }
    }
}

fn log_exit(report: &WorkerReport, remaining: usize) {
    let WorkerRecord { pid, ordinal } = report.record;
    match &report.status {
        Ok(status) if status.success() => {
            tracing::info!(pid, worker = ordinal, remaining, "Worker exited");
        },
        Ok(status) => match status.signal() {
            Some(signal) => {
                tracing::warn!(pid, worker = ordinal, signal, remaining, "Worker killed by signal");
            },
            None => {
                tracing::warn!(
                    pid,
                    worker = ordinal,
                    code = ?status.code(),
                    remaining,
                    "Worker exited with failure"
                );
            },
        },
        Err(e) => {
            tracing::error!(
                pid,
                worker = ordinal,
                error = %e,
                remaining,
                "Failed to wait for worker"
            );
        },
    }
}
