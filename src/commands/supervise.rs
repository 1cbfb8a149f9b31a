//! Default mode: prepare the process, then supervise the worker fleet.

use anyhow::Result;
use queuevisor::{Launcher, QueueRegistry, RunConfig, Supervisor, daemon};

/// Validate the queue, check the pidfile, detach if asked, and run the
/// supervisor until every worker has exited.
pub fn execute(config: &RunConfig, registry: &QueueRegistry, verbose: bool) -> Result<u8> {
    registry.ensure(&config.queue_name)?;

    let pidfile = daemon::prepare(config)?;

    let mut launcher = Launcher::for_queue(config)?;
    if verbose {
        launcher = launcher.arg("--verbose");
    }

    let exit = Supervisor::new(launcher, config.worker_count).run_blocking(pidfile)?;
    tracing::info!(?exit, "Supervisor exiting");
    Ok(exit.exit_code())
}
