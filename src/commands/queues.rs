//! `--available-queues`: print registered queue names, one per line.

use std::io::Write;

use anyhow::{Context, Result};
use queuevisor::QueueRegistry;

/// Write every registered queue name to stdout.
pub fn execute(registry: &QueueRegistry) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for name in registry.names() {
        writeln!(stdout, "{name}").context("Failed to write queue list")?;
    }
    Ok(())
}
