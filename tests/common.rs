//! Common test utilities for integration tests.
//!
//! Every test gets its own [`Harness`]: a temporary directory holding a
//! config file, a spool and any pidfiles or logs. The binary under test is
//! pointed at that config through `QUEUEVISOR_CONFIG`, so tests never touch
//! `~/.queuevisor` and can run in parallel.
//!
//! # Example
//!
//! ```rust,ignore
//! let harness = Harness::new();
//! let mut child = harness.command().args(["--queue=echo"]).spawn().unwrap();
//! signal(child.id(), Signal::SIGTERM);
//! let status = wait_with_timeout(&mut child, Duration::from_secs(10)).unwrap();
//! assert!(status.success());
//! ```

#![allow(dead_code)]

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Environment every test runs under.
pub const ENVIRONMENT: &str = "test";

/// Isolated working area for one test.
pub struct Harness {
    dir: TempDir,
    config: PathBuf,
    spool: PathBuf,
}

impl Harness {
    /// Harness with a fresh spool under the temp directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let spool = dir.path().join("spool");
        Self::with_spool(dir, spool)
    }

    /// Harness whose profile points at `spool`, wherever that is.
    pub fn with_spool(dir: TempDir, spool: PathBuf) -> Self {
        let config = dir.path().join("config.toml");
        let content = format!(
            "[environments.{ENVIRONMENT}]\n\
             spool_dir = \"{}\"\n\
             log_format = \"compact\"\n\
             log_level = \"info\"\n\
             empty_backoff_ms = 100\n",
            spool.display()
        );
        fs::write(&config, content).expect("Failed to write config");
        Self { dir, config, spool }
    }

    /// A path inside the harness directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn spool(&self) -> &Path {
        &self.spool
    }

    /// `incoming`, `processing` or `failed` for `queue`.
    pub fn queue_dir(&self, queue: &str, stage: &str) -> PathBuf {
        self.spool.join(queue).join(stage)
    }

    /// Enqueue a JSON message for `queue`.
    pub fn enqueue(&self, queue: &str, message: &Value) -> PathBuf {
        queuevisor::queue::spool::enqueue(&self.spool, queue, message)
            .expect("Failed to enqueue message")
    }

    /// Drop raw bytes into `queue`'s incoming directory.
    pub fn enqueue_raw(&self, queue: &str, name: &str, content: &str) -> PathBuf {
        let incoming = self.queue_dir(queue, "incoming");
        fs::create_dir_all(&incoming).expect("Failed to create incoming dir");
        let path = incoming.join(name);
        fs::write(&path, content).expect("Failed to write message");
        path
    }

    /// The binary, configured for this harness, with output discarded.
    pub fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_queuevisor"));
        command
            .env("QUEUEVISOR_CONFIG", &self.config)
            .env("QUEUEVISOR_ENV", ENVIRONMENT)
            .env_remove("RUST_LOG")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

/// Number of entries in `dir`; a missing directory counts as empty.
pub fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).map_or(0, Iterator::count)
}

/// Deliver `signal` to `pid`.
pub fn signal(pid: u32, signal: Signal) {
    kill(Pid::from_raw(pid as i32), signal).expect("Failed to send signal");
}

/// Whether `pid` still exists.
pub fn is_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Poll `predicate` every 20ms until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    predicate()
}

/// Wait for `child` to exit, killing it if `timeout` passes first.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let mut status = None;
    wait_until(timeout, || {
        status = child.try_wait().expect("Failed to poll child");
        status.is_some()
    });
    if status.is_none() {
        let _ = child.kill();
        let _ = child.wait();
    }
    status
}

/// Read a pidfile once it holds a complete pid.
pub fn read_pidfile(path: &Path, timeout: Duration) -> Option<u32> {
    let mut pid = None;
    wait_until(timeout, || {
        pid = fs::read_to_string(path)
            .ok()
            .and_then(|content| content.trim().parse().ok());
        pid.is_some()
    });
    pid
}

/// A pid that belonged to a process which has already been reaped.
pub fn dead_pid() -> u32 {
    let mut child = Command::new("true").spawn().expect("Failed to spawn true");
    let pid = child.id();
    child.wait().expect("Failed to reap true");
    pid
}
