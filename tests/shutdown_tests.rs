//! Two-phase shutdown tests against the real binary.
//!
//! The `delay` queue sleeps for `{"millis": N}` per message, which makes
//! "in-flight work" observable: a claimed message sits in `processing/`
//! until the worker finishes it.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test shutdown_tests
//! ```

#[path = "common.rs"]
mod common;

use common::{Harness, count_files, read_pidfile, signal, wait_until, wait_with_timeout};
use nix::sys::signal::Signal;
use serde_json::json;
use std::fs;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(15);

// =============================================================================
// Graceful Path
// =============================================================================

#[test]
fn test_single_sigterm_lets_in_flight_message_finish() {
    let harness = Harness::new();
    harness.enqueue("delay", &json!({"millis": 1500}));
    let processing = harness.queue_dir("delay", "processing");
    let incoming = harness.queue_dir("delay", "incoming");

    let mut child = harness.command().arg("--queue=delay").spawn().unwrap();

    assert!(
        wait_until(TIMEOUT, || count_files(&processing) == 1),
        "message was never claimed"
    );
    signal(child.id(), Signal::SIGTERM);

    let status = wait_with_timeout(&mut child, TIMEOUT).expect("supervisor did not exit");
    assert!(status.success(), "status: {status:?}");
    assert_eq!(count_files(&processing), 0, "in-flight message was abandoned");
    assert_eq!(count_files(&incoming), 0);
}

#[test]
fn test_sigterm_stops_every_idle_worker() {
    let harness = Harness::new();
    let pidfile = harness.path("q.pid");

    let mut child = harness
        .command()
        .args(["--queue=echo", "--num_processes=4"])
        .arg(format!("--pidfile={}", pidfile.display()))
        .spawn()
        .unwrap();

    assert_eq!(read_pidfile(&pidfile, TIMEOUT), Some(child.id()));
    // Workers create their spool directories on start.
    assert!(wait_until(TIMEOUT, || {
        harness.queue_dir("echo", "failed").exists()
    }));
    std::thread::sleep(Duration::from_millis(300));

    signal(child.id(), Signal::SIGINT);

    let status = wait_with_timeout(&mut child, TIMEOUT).expect("supervisor did not exit");
    assert!(status.success());
    assert!(!pidfile.exists());
}

#[test]
fn test_sigterm_during_worker_startup_is_graceful() {
    let harness = Harness::new();
    let pidfile = harness.path("q.pid");
    let log = harness.path("q.log");

    let mut child = harness
        .command()
        .args(["--queue=echo", "--num_processes=4"])
        .arg(format!("--pidfile={}", pidfile.display()))
        .stderr(fs::File::create(&log).unwrap())
        .spawn()
        .unwrap();

    // No settling delay: workers are still starting when the stop lands.
    assert_eq!(read_pidfile(&pidfile, TIMEOUT), Some(child.id()));
    signal(child.id(), Signal::SIGTERM);

    let status = wait_with_timeout(&mut child, TIMEOUT).expect("supervisor did not exit");
    assert!(status.success(), "status: {status:?}");

    let output = fs::read_to_string(&log).unwrap();
    assert!(output.contains("All workers exited"), "log: {output}");
    assert!(!output.contains("killed by signal"), "log: {output}");
    assert!(!output.contains("exited with failure"), "log: {output}");
}

// =============================================================================
// Forceful Path
// =============================================================================

#[test]
fn test_second_sigterm_exits_promptly_with_failure() {
    let harness = Harness::new();
    let pidfile = harness.path("q.pid");
    harness.enqueue("delay", &json!({"millis": 30_000}));
    harness.enqueue("delay", &json!({"millis": 30_000}));
    let processing = harness.queue_dir("delay", "processing");

    let mut child = harness
        .command()
        .args(["--queue=delay", "--num_processes=2"])
        .arg(format!("--pidfile={}", pidfile.display()))
        .spawn()
        .unwrap();

    assert!(
        wait_until(TIMEOUT, || count_files(&processing) == 2),
        "both messages should be claimed"
    );

    signal(child.id(), Signal::SIGTERM);
    std::thread::sleep(Duration::from_millis(200));
    let escalated = Instant::now();
    signal(child.id(), Signal::SIGTERM);

    let status = wait_with_timeout(&mut child, Duration::from_secs(5))
        .expect("supervisor kept waiting after the second signal");
    assert!(escalated.elapsed() < Duration::from_secs(5));
    assert_eq!(status.code(), Some(1));
    assert!(!pidfile.exists(), "pidfile must be cleaned up on the forceful path");

    // Killed workers never finish their messages.
    assert_eq!(count_files(&processing), 2);
}

// =============================================================================
// Failure Isolation
// =============================================================================

#[test]
fn test_invalid_message_is_set_aside_and_worker_continues() {
    let harness = Harness::new();
    harness.enqueue_raw("echo", "0001.json", "not json at all");
    harness.enqueue("echo", &json!({"hello": "world"}));
    let incoming = harness.queue_dir("echo", "incoming");
    let failed = harness.queue_dir("echo", "failed");

    let mut child = harness.command().arg("--queue=echo").spawn().unwrap();

    assert!(wait_until(TIMEOUT, || {
        count_files(&incoming) == 0 && count_files(&failed) == 1
    }));
    assert!(child.try_wait().unwrap().is_none(), "worker fleet died on a bad message");

    signal(child.id(), Signal::SIGTERM);
    let status = wait_with_timeout(&mut child, TIMEOUT).expect("supervisor did not exit");
    assert!(status.success());
    assert_eq!(
        fs::read_to_string(failed.join("0001.json")).unwrap(),
        "not json at all"
    );
}

#[test]
fn test_fatal_worker_does_not_hang_supervisor() {
    let dir = tempfile::TempDir::new().unwrap();
    // A regular file where the spool root should be: every worker fails to
    // start its queue and exits nonzero on its own.
    let blocker = dir.path().join("spool");
    fs::write(&blocker, "").unwrap();
    let harness = Harness::with_spool(dir, blocker);

    let mut child = harness
        .command()
        .args(["--queue=echo", "--num_processes=3"])
        .spawn()
        .unwrap();

    let status = wait_with_timeout(&mut child, TIMEOUT).expect("supervisor hung");
    assert!(status.success(), "worker statuses are logged, not aggregated");
}

// =============================================================================
// Daemon Mode
// =============================================================================

#[test]
fn test_daemon_detaches_and_cleans_up() {
    let harness = Harness::new();
    let pidfile = harness.path("q.pid");
    let log = harness.path("q.log");

    let status = harness
        .command()
        .args(["--queue=echo", "--daemon"])
        .arg(format!("--pidfile={}", pidfile.display()))
        .arg(format!("--log={}", log.display()))
        .status()
        .unwrap();
    assert!(status.success(), "foreground parent should exit 0");

    let pid = read_pidfile(&pidfile, TIMEOUT).expect("daemon never wrote its pidfile");
    assert_ne!(pid, std::process::id());

    harness.enqueue("echo", &json!({"from": "daemon test"}));
    let incoming = harness.queue_dir("echo", "incoming");
    assert!(wait_until(TIMEOUT, || count_files(&incoming) == 0));

    signal(pid, Signal::SIGTERM);
    assert!(
        wait_until(TIMEOUT, || !pidfile.exists()),
        "daemon did not remove its pidfile"
    );

    let output = fs::read_to_string(&log).unwrap();
    assert!(output.contains("Supervisor starting"), "log: {output}");
    assert!(output.contains("daemon test"), "log: {output}");
}
