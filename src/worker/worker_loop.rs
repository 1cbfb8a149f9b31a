//! Drain loop and outcome classification for one worker.
//!
//! ```text
//! Starting ──on_start──▶ Draining ──stop requested──▶ Stopping ──on_stop──▶ Stopped
//!     │                     │
//!     └──── hook error ─────┴── transport / unclassified ──▶ exit nonzero
//! ```
//!
//! The stop flag is only consulted between takes, so a graceful stop always
//! lets the current message finish.

use std::ops::ControlFlow;

use super::backoff::EmptyBackoff;
use crate::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::queue::{Outcome, QueueHandle};
use crate::shutdown::StopFlag;

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Draining,
    Stopping,
    Stopped,
}

/// How a worker loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Drained after a stop request and ran the shutdown hook.
    Graceful,
    /// Hit a condition that must terminate the worker.
    Fatal { reason: String },
}

impl WorkerExit {
    /// Process exit status for this ending.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Graceful => EXIT_SUCCESS,
            Self::Fatal { .. } => EXIT_FAILURE,
        }
    }

    fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }
}

/// Counters kept across one worker's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub invalid: u64,
    pub empty_polls: u64,
}

/// One worker's drain loop around a [`QueueHandle`].
pub struct WorkerLoop {
    ordinal: u32,
    handle: Box<dyn QueueHandle>,
    stop: StopFlag,
    backoff: EmptyBackoff,
    state: WorkerState,
    stats: WorkerStats,
}

impl WorkerLoop {
    pub fn new(
        ordinal: u32,
        handle: Box<dyn QueueHandle>,
        stop: StopFlag,
        backoff: EmptyBackoff,
    ) -> Self {
        Self {
            ordinal,
            handle,
            stop,
            backoff,
            state: WorkerState::Starting,
            stats: WorkerStats::default(),
        }
    }

    pub const fn state(&self) -> WorkerState {
        self.state
    }

    pub const fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Run until a graceful stop completes or a fatal outcome occurs.
    pub fn run(&mut self) -> WorkerExit {
        self.transition(WorkerState::Starting);
        if let Err(err) = self.handle.on_start() {
            tracing::error!(error = ?err, "Startup hook failed");
            return WorkerExit::fatal(format!("startup hook failed: {err:#}"));
        }

        self.transition(WorkerState::Draining);
        while !self.stop.is_requested() {
            if let ControlFlow::Break(exit) = self.step() {
                return exit;
            }
        }

        self.transition(WorkerState::Stopping);
        if let Err(err) = self.handle.on_stop() {
            tracing::warn!(error = ?err, "Shutdown hook failed");
        }

        self.transition(WorkerState::Stopped);
        tracing::info!(
            processed = self.stats.processed,
            invalid = self.stats.invalid,
            "Worker drained"
        );
        WorkerExit::Graceful
    }

    /// Take one message and classify the outcome.
    fn step(&mut self) -> ControlFlow<WorkerExit> {
        match self.handle.take_and_process_one() {
            Outcome::Processed => {
                self.stats.processed += 1;
                tracing::debug!(processed = self.stats.processed, "Processed message");
            },
            Outcome::Empty => {
                self.stats.empty_polls += 1;
                let delay = self.backoff.sleep(&self.stop);
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                tracing::trace!(delay_ms, "Queue empty");
            },
            Outcome::InvalidMessage { payload, reason } => {
                self.stats.invalid += 1;
                tracing::warn!(
                    classification = "invalid_message",
                    payload = %payload,
                    reason = %reason,
                    "Skipping invalid message"
                );
            },
            Outcome::TransportError(reason) => {
                tracing::error!(
                    classification = "transport_error",
                    reason = %reason,
                    "Queue transport failed, exiting"
                );
                return ControlFlow::Break(WorkerExit::fatal(format!(
                    "transport error: {reason}"
                )));
            },
            Outcome::Unclassified(err) => {
                // Debug formatting prints the cause chain and backtrace.
                tracing::error!(
                    classification = "unclassified",
                    error = ?err,
                    "Unclassified failure, exiting"
                );
                return ControlFlow::Break(WorkerExit::fatal(format!(
                    "unclassified failure: {err:#}"
                )));
            },
        }
        ControlFlow::Continue(())
    }

    fn transition(&mut self, next: WorkerState) {
        tracing::debug!(ordinal = self.ordinal, from = ?self.state, to = ?next, "Worker state");
        self.state = next;
    }
}
