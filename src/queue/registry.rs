//! Static table mapping queue names to the code that consumes them.
//!
//! The table is assembled once at startup with [`QueueRegistry::register`];
//! nothing is looked up from the filesystem at runtime.

use std::collections::BTreeMap;

use super::processors::{Delay, Echo};
use super::spool::SpoolQueue;
use super::{QueueContext, QueueHandle};
use crate::error::{Error, Result};

/// Opens a handle for one worker.
pub type QueueFactory = fn(&QueueContext) -> anyhow::Result<Box<dyn QueueHandle>>;

/// Registered queues, kept sorted by name.
#[derive(Clone, Default)]
pub struct QueueRegistry {
    entries: BTreeMap<&'static str, QueueFactory>,
}

impl QueueRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The queues shipped with the binary.
    pub fn builtin() -> Self {
        Self::new()
            .register("echo", SpoolQueue::<Echo>::open)
            .register("delay", SpoolQueue::<Delay>::open)
    }

    /// Add a queue. A later registration under the same name wins.
    #[must_use]
    pub fn register(mut self, name: &'static str, factory: QueueFactory) -> Self {
        self.entries.insert(name, factory);
        self
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Fail with [`Error::UnknownQueue`] unless `name` is registered.
    pub fn ensure(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(Error::unknown_queue(name))
        }
    }

    /// Open a handle for `context.queue_name`.
    pub fn open(&self, context: &QueueContext) -> anyhow::Result<Box<dyn QueueHandle>> {
        let factory = self
            .entries
            .get(context.queue_name.as_str())
            .ok_or_else(|| Error::unknown_queue(&context.queue_name))?;
        factory(context)
    }
}
