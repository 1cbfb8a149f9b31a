//! Starting worker processes and tracking them until they exit.
//!
//! Each worker is the current executable re-run with `--worker <ORDINAL>`.
//! Workers are placed in their own process group so a terminal Ctrl+C
//! reaches only the supervisor, which then forwards stop requests itself.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::task::Poll;
use tokio::process::{Child, Command};

use crate::config::RunConfig;
use crate::constants::WORKER_FLAG;
use crate::error::{Error, Result};
use crate::shutdown::{self, StopMode};

/// One launched worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerRecord {
    pub pid: u32,
    /// 1-based launch position, unique within one supervisor run.
    pub ordinal: u32,
}

/// A worker that has terminated, with its wait status.
#[derive(Debug)]
pub struct WorkerReport {
    pub record: WorkerRecord,
    pub status: io::Result<ExitStatus>,
}

#[derive(Debug)]
struct Member {
    record: WorkerRecord,
    child: Child,
}

/// Live workers, each held with its child handle until reaped.
///
/// A worker leaves the roster in the same poll that reaps it, so
/// [`Roster::signal_all`] never targets a pid the kernel may have reused.
#[derive(Debug, Default)]
pub struct Roster {
    members: Vec<Member>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `child` as live.
    fn track(&mut self, ordinal: u32, child: Child) -> Result<WorkerRecord> {
        let pid = child.id().ok_or_else(|| Error::Spawn {
            ordinal,
            source: io::Error::other("worker exited before its pid was read"),
        })?;
        let record = WorkerRecord { pid, ordinal };
        self.members.push(Member { record, child });
        Ok(record)
    }

    /// Workers that have not been reaped yet, in launch order.
    pub fn records(&self) -> impl Iterator<Item = WorkerRecord> + '_ {
        self.members.iter().map(|member| member.record)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Wait for the next worker to terminate and drop it from the roster.
    ///
    /// Returns `None` once every worker has been reaped. Cancel safe: a
    /// worker is only removed when its exit is returned.
    pub async fn next_exit(&mut self) -> Option<WorkerReport> {
        if self.members.is_empty() {
            return None;
        }

        let (index, status) = std::future::poll_fn(|cx| {
            for (index, member) in self.members.iter_mut().enumerate() {
                if let Poll::Ready(status) = std::pin::pin!(member.child.wait()).poll(cx) {
                    return Poll::Ready((index, status));
                }
            }
            Poll::Pending
        })
        .await;

        let member = self.members.remove(index);
        Some(WorkerReport {
            record: member.record,
            status,
        })
    }

    /// Send `mode`'s signal to every live worker.
    ///
    /// A worker that already exited (`ESRCH`) is skipped silently. Returns
    /// how many workers were signalled.
    pub fn signal_all(&self, mode: StopMode) -> usize {
        let mut sent = 0;
        for member in &self.members {
            let WorkerRecord { pid, ordinal } = member.record;
            // No pid once tokio has reaped the child.
            if member.child.id().is_none() {
                continue;
            }
            match mode.send(pid) {
                Ok(()) => {
                    sent += 1;
                    tracing::debug!(
                        pid,
                        worker = ordinal,
                        signal = %mode.signal(),
                        "Signalled worker"
                    );
                },
                Err(nix::errno::Errno::ESRCH) => {},
                Err(e) => {
                    tracing::error!(pid, worker = ordinal, error = %e, "Failed to signal worker");
                },
            }
        }
        sent
    }
}

/// How to start one worker process.
#[derive(Debug, Clone)]
pub struct Launcher {
    program: PathBuf,
    args: Vec<OsString>,
    defer_stops: bool,
}

impl Launcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            defer_stops: false,
        }
    }

    /// Re-run the current executable as a worker for `config`'s queue.
    pub fn for_queue(config: &RunConfig) -> Result<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| Error::io("resolving current executable", e))?;
        Ok(Self::new(exe)
            .arg("--queue")
            .arg(&config.queue_name)
            .arg("--environment")
            .arg(&config.environment)
            .defer_stops())
    }

    /// Append an argument passed to every worker.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Start workers with SIGTERM and SIGINT blocked.
    ///
    /// The worker must unblock them with
    /// [`release_stop_signals`](crate::shutdown::release_stop_signals) once
    /// its own handlers are installed; until then a stop request stays
    /// pending.
    #[must_use]
    pub fn defer_stops(mut self) -> Self {
        self.defer_stops = true;
        self
    }

    fn command(&self, ordinal: u32) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(WORKER_FLAG)
            .arg(ordinal.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .process_group(0);
        if self.defer_stops {
            block_stops_before_exec(&mut command);
        }
        command
    }

    /// Start workers `1..=count`, adding each to `roster` as it starts.
    ///
    /// Stops at the first failure; workers already started stay in the
    /// roster so the caller can stop them.
    pub fn launch(&self, count: u32, roster: &mut Roster) -> Result<()> {
        for ordinal in 1..=count {
            let child = self
                .command(ordinal)
                .spawn()
                .map_err(|source| Error::Spawn { ordinal, source })?;
            let record = roster.track(ordinal, child)?;
            tracing::info!(pid = record.pid, worker = ordinal, "Spawned worker process");
        }

        tracing::info!(count, "All workers started");
        Ok(())
    }
}

/// Block stop signals in the child between fork and exec.
///
/// The standard library clears the child's signal mask before running
/// pre-exec hooks, so the mask has to be set here rather than inherited.
///
/// # Safety
///
/// The hook runs in the forked child. It only calls `pthread_sigmask`,
/// which is async-signal-safe, and does not allocate or lock.
#[allow(unsafe_code)] // SAFETY: Unix pre_exec adjusting the signal mask only
fn block_stops_before_exec(command: &mut Command) {
    unsafe {
        command.pre_exec(|| shutdown::defer_stop_signals().map_err(io::Error::from));
    }
}
