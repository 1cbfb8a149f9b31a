//! Two-phase stop protocol shared by the supervisor and every worker.
//!
//! Each process owns exactly one [`StopFlag`]. The first stop request moves
//! it from running to stop-requested and asks for a graceful drain; any
//! further request escalates to a forceful stop. The flag never reverts.
//!
//! Signals are observed through tokio's signal streams: the runtime's
//! handler only records delivery, and the reaction (signalling children,
//! exiting) runs in ordinary task context.

use nix::sys::signal::{SigSet, SigmaskHow, Signal, kill, pthread_sigmask};
use nix::unistd::Pid;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::signal::unix::{SignalKind, signal};

/// What a stop request means given the flag's previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// First request: finish current work, then exit cleanly.
    Graceful,
    /// Repeated request: exit now, abandoning in-flight work.
    Forceful,
}

/// Per-process `Running` / `StopRequested` flag.
///
/// Cloning shares the flag, so the signal task and the drain loop of one
/// process see the same state.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    requested: Arc<AtomicBool>,
}

impl StopFlag {
    /// Create a flag in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any stop has been requested.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Record a stop request and report how far it escalates.
    pub fn request(&self) -> Escalation {
        if self.requested.swap(true, Ordering::SeqCst) {
            Escalation::Forceful
        } else {
            Escalation::Graceful
        }
    }
}

/// How the supervisor asks a worker to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// SIGTERM: the worker drains its current item, then exits 0.
    Graceful,
    /// SIGKILL: the worker is terminated immediately.
    Forceful,
}

impl From<Escalation> for StopMode {
    fn from(escalation: Escalation) -> Self {
        match escalation {
            Escalation::Graceful => Self::Graceful,
            Escalation::Forceful => Self::Forceful,
        }
    }
}

impl StopMode {
    /// The OS signal carrying this request.
    pub const fn signal(self) -> Signal {
        match self {
            Self::Graceful => Signal::SIGTERM,
            Self::Forceful => Signal::SIGKILL,
        }
    }

    /// Deliver the request to `pid`.
    pub fn send(self, pid: u32) -> nix::Result<()> {
        let raw = i32::try_from(pid).map_err(|_| nix::errno::Errno::EINVAL)?;
        kill(Pid::from_raw(raw), self.signal())
    }
}

/// Which stop signal arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM
    Terminate,
    /// SIGINT
    Interrupt,
}

/// Source of stop requests for a control loop.
///
/// [`StopSignals`] is the production source; tests feed requests through a
/// channel instead of signalling the test process.
#[allow(async_fn_in_trait)]
pub trait StopSource {
    /// Wait for the next stop request.
    async fn recv(&mut self) -> StopSignal;
}

/// Stream of SIGTERM / SIGINT deliveries.
///
/// Must be created inside a tokio runtime with the signal driver enabled.
/// Once installed, the default "terminate the process" action is replaced
/// for the rest of the process lifetime.
pub struct StopSignals {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

impl StopSignals {
    /// Register listeners for SIGTERM and SIGINT.
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }
}

impl StopSource for StopSignals {
    async fn recv(&mut self) -> StopSignal {
        tokio::select! {
            Some(()) = self.terminate.recv() => StopSignal::Terminate,
            Some(()) = self.interrupt.recv() => StopSignal::Interrupt,
            else => std::future::pending().await,
        }
    }
}

fn stop_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGTERM);
    set.add(Signal::SIGINT);
    set
}

/// Block SIGTERM and SIGINT on the calling thread.
///
/// Run in a worker's pre-exec hook: the blocked mask survives exec, so a
/// stop request sent before the worker has installed [`StopSignals`] stays
/// pending instead of killing it. Only calls `sigemptyset`, `sigaddset` and
/// `pthread_sigmask`, all async-signal-safe.
pub fn defer_stop_signals() -> nix::Result<()> {
    pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&stop_set()), None)
}

/// Unblock SIGTERM and SIGINT on the calling thread.
///
/// Signals that arrived while blocked are delivered now.
pub fn release_stop_signals() -> nix::Result<()> {
    pthread_sigmask(SigmaskHow::SIG_UNBLOCK, Some(&stop_set()), None)
}
