//! The capability a worker consumes its queue through.
//!
//! A [`QueueHandle`] takes one unit of work, processes it, and reports what
//! happened as an [`Outcome`]. Transport, persistence and business logic are
//! the handle's concern; the worker loop only classifies outcomes.
//!
//! ## Module Structure
//!
//! - [`registry`]: static name → factory table
//! - [`spool`]: directory-backed transport adapter
//! - [`processors`]: built-in message processors

pub mod processors;
pub mod registry;
pub mod spool;

use std::fmt;
use std::path::PathBuf;

use crate::config::Profile;

pub use registry::{QueueFactory, QueueRegistry};

/// Result of one `take_and_process_one` call.
pub enum Outcome {
    /// No work currently available.
    Empty,
    /// One message was taken and processed.
    Processed,
    /// A malformed or unrecognized payload was taken and set aside.
    InvalidMessage {
        /// The raw payload, as text.
        payload: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The queue backend is unreachable or erroring.
    TransportError(String),
    /// Anything else; assumed to be a defect.
    Unclassified(anyhow::Error),
}

impl Outcome {
    /// Short label used in log records.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Processed => "processed",
            Self::InvalidMessage { .. } => "invalid_message",
            Self::TransportError(_) => "transport_error",
            Self::Unclassified(_) => "unclassified",
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Processed => f.write_str("Processed"),
            Self::InvalidMessage { payload, reason } => f
                .debug_struct("InvalidMessage")
                .field("payload", payload)
                .field("reason", reason)
                .finish(),
            Self::TransportError(reason) => f.debug_tuple("TransportError").field(reason).finish(),
            Self::Unclassified(err) => write!(f, "Unclassified({err:#})"),
        }
    }
}

/// A consumer bound to one queue inside one worker process.
///
/// The hooks run once each: `on_start` before the first take, `on_stop`
/// after a graceful drain. Neither runs concurrently with a take.
pub trait QueueHandle: Send {
    /// Prepare the handle. An error here is fatal for the worker.
    fn on_start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Take one message, if any, and process it.
    fn take_and_process_one(&mut self) -> Outcome;

    /// Release resources after draining. Errors are logged, not raised.
    fn on_stop(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Everything a factory needs to open a handle for one worker.
#[derive(Debug, Clone)]
pub struct QueueContext {
    /// Registered queue name.
    pub queue_name: String,
    /// Worker ordinal, `1..=worker_count`.
    pub ordinal: u32,
    /// Root of the spool queues for the active environment.
    pub spool_dir: PathBuf,
}

impl QueueContext {
    /// Build a context from the active profile.
    pub fn new(queue_name: impl Into<String>, ordinal: u32, profile: &Profile) -> Self {
        Self {
            queue_name: queue_name.into(),
            ordinal,
            spool_dir: profile.spool_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_kind_labels() {
        assert_eq!(Outcome::Empty.kind(), "empty");
        assert_eq!(Outcome::Processed.kind(), "processed");
        assert_eq!(
            Outcome::TransportError("down".into()).kind(),
            "transport_error"
        );
        assert_eq!(
            Outcome::Unclassified(anyhow::anyhow!("boom")).kind(),
            "unclassified"
        );
    }

    #[test]
    fn test_unclassified_debug_includes_chain() {
        let err = anyhow::anyhow!("disk full").context("writing receipt");
        let rendered = format!("{:?}", Outcome::Unclassified(err));
        assert!(rendered.contains("writing receipt"));
        assert!(rendered.contains("disk full"));
    }

    #[test]
    fn test_default_hooks_succeed() {
        struct Idle;
        impl QueueHandle for Idle {
            fn take_and_process_one(&mut self) -> Outcome {
                Outcome::Empty
            }
        }

        let mut idle = Idle;
        assert!(idle.on_start().is_ok());
        assert!(matches!(idle.take_and_process_one(), Outcome::Empty));
        assert!(idle.on_stop().is_ok());
    }
}
