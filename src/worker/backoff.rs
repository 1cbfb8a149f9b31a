//! Randomized sleep after an empty poll.
//!
//! Full jitter: each delay is drawn uniformly from `[0, max]`, so a fleet of
//! idle workers does not poll the backend in lock-step.

use rand::Rng;
use std::time::{Duration, Instant};

use crate::constants::BACKOFF_SLICE_MS;
use crate::shutdown::StopFlag;

/// Backoff applied when the queue reports no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyBackoff {
    max: Duration,
}

impl EmptyBackoff {
    /// Delays drawn from `[0, max]`.
    pub const fn new(max: Duration) -> Self {
        Self { max }
    }

    /// Build from a millisecond bound.
    pub const fn from_millis(max_ms: u64) -> Self {
        Self::new(Duration::from_millis(max_ms))
    }

    /// Upper bound of a single delay.
    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Draw the next delay.
    pub fn next_delay(&self) -> Duration {
        let ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        if ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=ms))
    }

    /// Sleep for one random delay, returning early once `stop` is requested.
    pub fn sleep(&self, stop: &StopFlag) -> Duration {
        let delay = self.next_delay();
        let deadline = Instant::now() + delay;
        let slice = Duration::from_millis(BACKOFF_SLICE_MS);

        while !stop.is_requested() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(slice));
        }
        delay
    }
}
