//! Hidden `--worker` mode: run one drain loop in this process.

use anyhow::Result;
use queuevisor::{Profile, QueueRegistry, worker};

/// Run worker `ordinal` for `queue` and return its exit status.
pub fn execute(
    queue: &str,
    ordinal: u32,
    profile: &Profile,
    registry: &QueueRegistry,
) -> Result<u8> {
    let exit = worker::run(queue, ordinal, profile, registry)?;
    Ok(exit.exit_code())
}
