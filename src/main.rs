//! queuevisor - drain a named work queue with N supervised worker processes.
//!
//! This is the CLI entry point. One invocation does exactly one of:
//!
//! - list the registered queues (`--available-queues`)
//! - run as a worker process (hidden `--worker`, spawned by the supervisor)
//! - supervise a fleet of workers (everything else)
//!
//! See `queuevisor --help` for full usage information.

use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use queuevisor::constants::{DEFAULT_ENVIRONMENT, ENVIRONMENT_ENV, EXIT_FAILURE};
use queuevisor::{Error, LogConfig, QueueRegistry, RunConfig, Settings, init_logging};
use tracing::Level;

mod commands;

const AFTER_HELP: &str = "\
SIGNALS:
  SIGTERM / SIGINT (first)   Workers finish their current message, then exit
  SIGTERM / SIGINT (second)  Workers are killed; the supervisor exits 1

CONFIGURATION:
  Profiles are read from ~/.queuevisor/config.toml, or from the file named
  by QUEUEVISOR_CONFIG, under [environments.<name>].

EXAMPLES:
  queuevisor --available-queues                 List queues
  queuevisor --queue=echo                       One worker in the foreground
  queuevisor --queue=echo --num_processes=4     Four workers
  queuevisor --queue=echo --daemon --pidfile=/run/q.pid --log=/var/log/q.log";

#[derive(Parser)]
#[command(name = "queuevisor")]
#[command(version)]
#[command(about = "Drain a work queue with N supervised worker processes")]
#[command(after_help = AFTER_HELP)]
struct Cli {
    /// Queue whose consumer logic the workers run
    #[arg(long, value_name = "NAME")]
    queue: Option<String>,

    /// Detach from the terminal and run in the background
    #[arg(long)]
    daemon: bool,

    /// Runtime configuration profile
    #[arg(long, value_name = "NAME", env = ENVIRONMENT_ENV, default_value = DEFAULT_ENVIRONMENT)]
    environment: String,

    /// Redirect stdout/stderr to this file when running with --daemon
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,

    /// Number of worker processes
    #[arg(
        long = "num_processes",
        value_name = "N",
        default_value_t = 1
    )]
    num_processes: u32,

    /// Where to record the supervisor's pid
    #[arg(long, value_name = "PATH")]
    pidfile: Option<PathBuf>,

    /// List registered queue names and exit
    #[arg(long)]
    available_queues: bool,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,

    /// Run as worker ORDINAL (internal, set by the supervisor)
    #[arg(long, value_name = "ORDINAL", hide = true)]
    worker: Option<u32>,
}

fn main() -> ExitCode {
    let registry = QueueRegistry::builtin();

    // Listing wins over every other flag, including ones that fail to parse.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(_) if lists_queues(std::env::args_os().skip(1)) => {
            return report(commands::queues::execute(&registry).map(|()| 0));
        },
        Err(e) => e.exit(),
    };

    if cli.available_queues {
        return report(commands::queues::execute(&registry).map(|()| 0));
    }

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => return report(Err(e.into())),
    };
    let profile = settings.profile(&cli.environment);

    let ansi = !cli.daemon && std::io::stderr().is_terminal();
    let mut logging = LogConfig::from_profile(&profile).ansi(ansi);
    if cli.verbose {
        logging = logging.level(Level::DEBUG);
    }
    init_logging(&logging);

    let Some(queue) = cli.queue else {
        return report(Err(Error::MissingQueue.into()));
    };

    if let Some(ordinal) = cli.worker {
        return report(commands::worker::execute(&queue, ordinal, &profile, &registry));
    }

    let config = match RunConfig::new(queue, cli.num_processes, cli.environment) {
        Ok(config) => config
            .detached(cli.daemon, cli.log)
            .with_pidfile(cli.pidfile),
        Err(e) => return report(Err(e.into())),
    };

    report(commands::supervise::execute(&config, &registry, cli.verbose))
}

/// Whether `--available-queues` appears before any `--` separator.
fn lists_queues(args: impl IntoIterator<Item = OsString>) -> bool {
    args.into_iter()
        .take_while(|arg| arg != "--")
        .any(|arg| arg == "--available-queues")
}

/// Turn a command result into the process exit status, printing errors.
fn report(result: anyhow::Result<u8>) -> ExitCode {
    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        },
    }
}
