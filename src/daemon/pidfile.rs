//! Pidfile bookkeeping for the supervisor.
//!
//! At most one live supervisor may own a pidfile path. On startup the
//! recorded pid is probed with a zero-effect signal: a live process aborts
//! startup, anything else is stale and removed. The check-then-write is not
//! atomic; two supervisors started in the same instant can both win.

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// What [`Pidfile::check`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PidfileStatus {
    /// No pidfile existed.
    Absent,
    /// A pidfile existed but its process was gone; it has been deleted.
    StaleRemoved { pid: Option<i32> },
}

/// A pidfile path and the operations on it.
#[derive(Debug, Clone)]
pub struct Pidfile {
    path: PathBuf,
}

impl Pidfile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded pid.
    ///
    /// `None` when the file is missing or holds anything other than a
    /// positive integer.
    pub fn read_pid(&self) -> Result<Option<i32>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.trim().parse::<i32>().ok().filter(|pid| *pid > 0)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(
                format!("reading pidfile {}", self.path.display()),
                e,
            )),
        }
    }

    /// Refuse to start if the recorded process is alive; clear stale files.
    ///
    /// A pidfile naming this very process counts as stale. A live owner is
    /// reported as [`Error::AlreadyRunning`] and the file is left untouched.
    pub fn check(&self) -> Result<PidfileStatus> {
        if !self.path.exists() {
            return Ok(PidfileStatus::Absent);
        }

        let recorded = self.read_pid()?;
        // After a container restart the recorded pid can be our own.
        let own = i32::try_from(std::process::id()).ok();

        if let Some(pid) = recorded
            && Some(pid) != own
            && is_alive(pid)
        {
            return Err(Error::AlreadyRunning {
                pid,
                path: self.path.clone(),
            });
        }

        tracing::warn!(
            path = %self.path.display(),
            pid = ?recorded,
            "Removing stale pidfile"
        );
        self.remove()?;
        Ok(PidfileStatus::StaleRemoved { pid: recorded })
    }

    /// Record the current process id, replacing any previous content.
    pub fn write(&self) -> Result<()> {
        fs::write(&self.path, std::process::id().to_string()).map_err(|e| {
            Error::io(format!("writing pidfile {}", self.path.display()), e)
        })
    }

    /// Delete the pidfile. A missing file is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(
                format!("removing pidfile {}", self.path.display()),
                e,
            )),
        }
    }

    /// Write the pidfile and hand back a guard that deletes it on drop.
    pub fn claim(self) -> Result<PidfileGuard> {
        self.write()?;
        tracing::debug!(path = %self.path.display(), pid = std::process::id(), "Wrote pidfile");
        Ok(PidfileGuard { pidfile: self })
    }
}

/// Removes the pidfile when the supervisor leaves its run scope, whatever
/// the exit path.
#[derive(Debug)]
pub struct PidfileGuard {
    pidfile: Pidfile,
}

impl PidfileGuard {
    pub fn path(&self) -> &Path {
        self.pidfile.path()
    }
}

impl Drop for PidfileGuard {
    fn drop(&mut self) {
        match self.pidfile.remove() {
            Ok(()) => tracing::debug!(path = %self.path().display(), "Removed pidfile"),
            Err(e) => tracing::warn!(error = %e, "Failed to remove pidfile"),
        }
    }
}

/// Probe `pid` with signal 0.
///
/// `EPERM` means the process exists but belongs to someone else, which
/// still counts as alive.
pub fn is_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    match kill(Pid::from_raw(pid), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
