//! Detaching the supervisor from its controlling terminal.
//!
//! Must run before any async runtime or extra thread exists: `fork` only
//! carries the calling thread into the child.

use daemonize::Daemonize;
use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::{Error, Result};

/// Open (append, create) the file that will receive stdout and stderr.
fn open_log(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Fork into the background as a session leader with no controlling tty.
///
/// Stdin is bound to the null device. Stdout and stderr go to `log_path`
/// when it can be opened and to the null device otherwise. The working
/// directory is kept so relative pidfile and log paths stay valid.
///
/// Returns in the daemon process only; the foreground parent exits 0.
pub fn detach(log_path: Option<&Path>) -> Result<()> {
    let cwd = std::env::current_dir().map_err(|e| Error::io("resolving working directory", e))?;
    let mut daemon = Daemonize::new().working_directory(cwd);

    if let Some(path) = log_path {
        match open_log(path).and_then(|file| Ok((file.try_clone()?, file))) {
            Ok((stdout, stderr)) => {
                daemon = daemon.stdout(stdout).stderr(stderr);
            },
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Cannot open log file, discarding output"
                );
            },
        }
    }

    daemon
        .start()
        .map_err(|e| Error::Daemonize(e.to_string()))?;

    tracing::info!(pid = std::process::id(), "Detached from terminal");
    Ok(())
}
