//! Worker process entry point.
//!
//! A worker is the same binary re-executed by the supervisor with a hidden
//! `--worker <ORDINAL>` flag. It owns one [`QueueHandle`](crate::queue::QueueHandle)
//! and its own [`StopFlag`]; nothing is shared with the supervisor or with
//! sibling workers except the queue backend.
//!
//! The drain loop runs on a blocking thread while a small async task
//! watches for stop signals:
//!
//! - first SIGTERM/SIGINT: flip the flag, let the current message finish
//! - second SIGTERM/SIGINT: exit immediately with status 1
//!
//! ## Module Structure
//!
//! - [`worker_loop`]: state machine and outcome classification
//! - [`backoff`]: randomized sleep after empty polls

pub mod backoff;
pub mod worker_loop;

use tracing::Instrument;

use crate::config::Profile;
use crate::constants::EXIT_FAILURE;
use crate::error::{Error, Result};
use crate::queue::{QueueContext, QueueRegistry};
use crate::shutdown::{Escalation, StopFlag, StopSignals, StopSource, release_stop_signals};

pub use backoff::EmptyBackoff;
pub use worker_loop::{WorkerExit, WorkerLoop, WorkerState, WorkerStats};

/// Run one worker process to completion.
///
/// Returns the loop's ending; the caller turns it into the process exit
/// status. Only setup failures (runtime, signal registration) are errors.
pub fn run(
    queue_name: &str,
    ordinal: u32,
    profile: &Profile,
    registry: &QueueRegistry,
) -> Result<WorkerExit> {
    let span = crate::worker_span!(queue_name, ordinal);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::io("building worker runtime", e))?;

    runtime.block_on(
        async move {
            let signals = StopSignals::install()
                .map_err(|e| Error::io("installing signal handlers", e))?;
            // Workers start with stop signals blocked; a request that arrived
            // during startup is delivered here.
            release_stop_signals()
                .map_err(|e| Error::io("unblocking stop signals", e.into()))?;
            let stop = StopFlag::new();

            let context = QueueContext::new(queue_name, ordinal, profile);
            let handle = match registry.open(&context) {
                Ok(handle) => handle,
                Err(err) => {
                    tracing::error!(error = ?err, "Failed to open queue");
                    return Ok(WorkerExit::Fatal {
                        reason: format!("failed to open queue: {err:#}"),
                    });
                },
            };

            tracing::info!(pid = std::process::id(), "Worker started");

            let watcher = tokio::spawn(watch_signals(signals, stop.clone()).in_current_span());

            let backoff = EmptyBackoff::from_millis(profile.empty_backoff_ms);
            let loop_span = tracing::Span::current();
            let drained = tokio::task::spawn_blocking(move || {
                let _entered = loop_span.enter();
                WorkerLoop::new(ordinal, handle, stop, backoff).run()
            })
            .await;

            watcher.abort();

            let exit = match drained {
                Ok(exit) => exit,
                Err(join) if join.is_panic() => {
                    let reason = panic_message(join.into_panic());
                    tracing::error!(
                        classification = "unclassified",
                        panic = %reason,
                        "Worker panicked"
                    );
                    WorkerExit::Fatal {
                        reason: format!("panicked: {reason}"),
                    }
                },
                Err(join) => WorkerExit::Fatal {
                    reason: join.to_string(),
                },
            };

            if let WorkerExit::Fatal { reason } = &exit {
                tracing::error!(reason = %reason, "Worker exiting abnormally");
            } else {
                tracing::info!("Worker stopped");
            }
            Ok(exit)
        }
        .instrument(span),
    )
}

/// React to stop signals for the lifetime of the worker.
async fn watch_signals(mut signals: StopSignals, stop: StopFlag) {
    loop {
        let signal = signals.recv().await;
        match stop.request() {
            Escalation::Graceful => {
                tracing::info!(?signal, "Stop requested, finishing current message");
            },
            Escalation::Forceful => {
                tracing::warn!(?signal, "Second stop signal, abandoning current message");
                std::process::exit(i32::from(EXIT_FAILURE));
            },
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
