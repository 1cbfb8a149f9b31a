//! Built-in message processors for the spool queue.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Why a processor refused or failed a message.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The payload is malformed for this processor. The message is set aside.
    #[error("invalid message: {0}")]
    Invalid(String),
    /// Processing failed for an unknown reason.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Business logic applied to one decoded message.
pub trait Processor: Default + Send + 'static {
    /// Process one message.
    fn process(&mut self, message: &Value) -> Result<(), ProcessError>;
}

/// Logs every JSON object it receives.
#[derive(Debug, Default)]
pub struct Echo;

impl Processor for Echo {
    fn process(&mut self, message: &Value) -> Result<(), ProcessError> {
        if !message.is_object() {
            return Err(ProcessError::Invalid("expected a JSON object".to_string()));
        }
        tracing::info!(payload = %message, "echo");
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DelayMessage {
    millis: u64,
}

/// Sleeps for `{"millis": N}` milliseconds, standing in for slow work.
#[derive(Debug, Default)]
pub struct Delay;

impl Processor for Delay {
    fn process(&mut self, message: &Value) -> Result<(), ProcessError> {
        let DelayMessage { millis } = DelayMessage::deserialize(message)
            .map_err(|e| ProcessError::Invalid(e.to_string()))?;
        tracing::debug!(millis, "delay started");
        std::thread::sleep(Duration::from_millis(millis));
        tracing::debug!(millis, "delay finished");
        Ok(())
    }
}
