//! Lifecycle management for the supervisor process.
//!
//! Runs once, before any worker is launched:
//!
//! 1. refuse to start if the pidfile names a live process, clear it if stale
//! 2. optionally detach from the terminal ([`detach`])
//!
//! The (post-fork) pid is recorded later with [`Pidfile::claim`], once the
//! supervisor's signal handlers are in place.
//!
//! ## Module Structure
//!
//! - [`pidfile`]: pidfile check, write and cleanup
//! - [`detach`]: daemonization and I/O redirection

pub mod detach;
pub mod pidfile;

pub use detach::detach;
pub use pidfile::{Pidfile, PidfileGuard, PidfileStatus, is_alive};

use crate::config::RunConfig;
use crate::error::Result;

/// Prepare the process environment described by `config`.
///
/// Returns the pidfile to claim, if one is configured. Nothing is written
/// here; a live owner aborts before detaching.
pub fn prepare(config: &RunConfig) -> Result<Option<Pidfile>> {
    let pidfile = config.pidfile_path.as_ref().map(Pidfile::new);

    if let Some(pidfile) = &pidfile {
        pidfile.check()?;
    }

    if config.detach {
        detach(config.log_path.as_deref())?;
    } else if let Some(log) = &config.log_path {
        tracing::warn!(log = %log.display(), "--log only applies with --daemon, ignoring");
    }

    Ok(pidfile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_prepare_without_pidfile() {
        let config = RunConfig::new("echo", 1, "test").unwrap();
        assert!(prepare(&config).unwrap().is_none());
    }

    #[test]
    fn test_prepare_clears_stale_and_claims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.pid");
        std::fs::write(&path, "0").unwrap();
        let config = RunConfig::new("echo", 1, "test")
            .unwrap()
            .with_pidfile(Some(path.clone()));

        let pidfile = prepare(&config).unwrap().unwrap();
        assert!(!path.exists());

        let guard = pidfile.claim().unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            std::process::id().to_string()
        );

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn test_prepare_refuses_live_pidfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.pid");
        std::fs::write(&path, "1").unwrap();
        let config = RunConfig::new("echo", 1, "test")
            .unwrap()
            .with_pidfile(Some(PathBuf::from(&path)));

        // pid 1 always exists; EPERM still counts as alive.
        assert!(prepare(&config).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1");
    }
}
