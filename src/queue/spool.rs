//! Directory-backed queue transport.
//!
//! Each queue lives under `<spool_dir>/<queue>/`:
//!
//! ```text
//! incoming/    JSON messages waiting to be taken (oldest name first)
//! processing/  messages claimed by a worker
//! failed/      messages rejected as invalid
//! ```
//!
//! A worker claims a message by renaming it from `incoming/` into
//! `processing/`. Rename is atomic within one filesystem, so any number of
//! workers can consume the same queue; losing the race for a file just
//! moves on to the next one.

use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::processors::{ProcessError, Processor};
use super::{Outcome, QueueContext, QueueHandle};

const INCOMING: &str = "incoming";
const PROCESSING: &str = "processing";
const FAILED: &str = "failed";
const MESSAGE_EXT: &str = "json";

static ENQUEUE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Write `message` into the `incoming/` directory of `queue`.
///
/// The file is written under a temporary name and renamed into place, so
/// consumers never see a partial message. Names sort in enqueue order.
pub fn enqueue(spool_dir: &Path, queue: &str, message: &Value) -> io::Result<PathBuf> {
    let incoming = spool_dir.join(queue).join(INCOMING);
    fs::create_dir_all(&incoming)?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let seq = ENQUEUE_SEQ.fetch_add(1, Ordering::Relaxed);
    let name = format!("{nanos:024}-{}-{seq:06}.{MESSAGE_EXT}", std::process::id());

    let tmp = incoming.join(format!(".{name}.tmp"));
    fs::write(&tmp, serde_json::to_vec(message)?)?;

    let path = incoming.join(name);
    fs::rename(&tmp, &path)?;
    Ok(path)
}

/// Spool consumer running processor `P` on every message.
pub struct SpoolQueue<P> {
    root: PathBuf,
    ordinal: u32,
    processor: P,
    processed: u64,
}

impl<P: Processor> SpoolQueue<P> {
    /// Create a consumer for the queue named in `context`.
    pub fn new(context: &QueueContext) -> Self {
        Self {
            root: context.spool_dir.join(&context.queue_name),
            ordinal: context.ordinal,
            processor: P::default(),
            processed: 0,
        }
    }

    /// [`QueueFactory`](super::QueueFactory) for registration.
    pub fn open(context: &QueueContext) -> anyhow::Result<Box<dyn QueueHandle>> {
        Ok(Box::new(Self::new(context)))
    }

    /// Messages processed successfully so far.
    pub const fn processed(&self) -> u64 {
        self.processed
    }

    fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Move the oldest incoming message into `processing/`.
    fn claim(&self) -> io::Result<Option<PathBuf>> {
        let incoming = self.dir(INCOMING);
        let mut names: Vec<_> = fs::read_dir(&incoming)?
            .filter_map(|entry| entry.ok().map(|e| e.file_name()))
            .filter(|name| Path::new(name).extension().is_some_and(|ext| ext == MESSAGE_EXT))
            .collect();
        names.sort();

        let processing = self.dir(PROCESSING);
        for name in names {
            let claimed = processing.join(&name);
            match fs::rename(incoming.join(&name), &claimed) {
                Ok(()) => return Ok(Some(claimed)),
                // Another worker got there first.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {},
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn reject(&self, claimed: &Path, payload: String, reason: String) -> Outcome {
        let Some(name) = claimed.file_name() else {
            return Outcome::TransportError(format!("bad claim path {}", claimed.display()));
        };
        if let Err(e) = fs::rename(claimed, self.dir(FAILED).join(name)) {
            return Outcome::TransportError(format!(
                "moving {} to {FAILED}/: {e}",
                claimed.display()
            ));
        }
        Outcome::InvalidMessage { payload, reason }
    }
}

impl<P: Processor> QueueHandle for SpoolQueue<P> {
    fn on_start(&mut self) -> anyhow::Result<()> {
        for name in [INCOMING, PROCESSING, FAILED] {
            let dir = self.dir(name);
            fs::create_dir_all(&dir).map_err(|e| {
                anyhow::anyhow!("failed to create spool directory {}: {e}", dir.display())
            })?;
        }
        tracing::debug!(root = %self.root.display(), ordinal = self.ordinal, "Spool ready");
        Ok(())
    }

    fn take_and_process_one(&mut self) -> Outcome {
        let claimed = match self.claim() {
            Ok(Some(path)) => path,
            Ok(None) => return Outcome::Empty,
            Err(e) => {
                return Outcome::TransportError(format!(
                    "reading {}: {e}",
                    self.dir(INCOMING).display()
                ));
            },
        };

        let bytes = match fs::read(&claimed) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Outcome::TransportError(format!("reading {}: {e}", claimed.display()));
            },
        };
        let payload = String::from_utf8_lossy(&bytes).into_owned();

        let message: Value = match serde_json::from_slice(&bytes) {
            Ok(message) => message,
            Err(e) => return self.reject(&claimed, payload, format!("not JSON: {e}")),
        };

        match self.processor.process(&message) {
            Ok(()) => match fs::remove_file(&claimed) {
                Ok(()) => {
                    self.processed += 1;
                    Outcome::Processed
                },
                Err(e) => {
                    Outcome::TransportError(format!("removing {}: {e}", claimed.display()))
                },
            },
            Err(ProcessError::Invalid(reason)) => self.reject(&claimed, payload, reason),
            Err(ProcessError::Failed(err)) => {
                Outcome::Unclassified(err.context(format!("processing {}", claimed.display())))
            },
        }
    }

    fn on_stop(&mut self) -> anyhow::Result<()> {
        tracing::info!(
            root = %self.root.display(),
            processed = self.processed,
            "Spool consumer stopped"
        );
        Ok(())
    }
}
