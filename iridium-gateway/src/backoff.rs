//! Reconnect backoff.

use std::time::Duration;
use tokio::time::Instant;

/// Exponential backoff for reconnect delays.
///
/// Each call to [`next`] computes `offset + base^occurrences` seconds and
/// increments the occurrence count up to `max_occurrences`. If more than
/// `offset + base^(max_occurrences + 1)` seconds have elapsed since the
/// previous call, the count resets to 0, so a brief outage does not leave
/// the client stuck at the maximum delay. With `randomize`, a uniform
/// `[0, 1)` second jitter is added to the result.
///
/// [`next`]: ExponentialBackoff::next
#[derive(Debug)]
pub struct ExponentialBackoff {
    offset: f64,
    base: f64,
    max_occurrences: u32,
    randomize: bool,
    occurrences: u32,
    last_called: Instant,
}

impl ExponentialBackoff {
    /// Backoff with the standard parameters: no offset, base 2, capped at
    /// `2^10` seconds, with jitter.
    pub fn new() -> Self {
        Self::with_parameters(0.0, 2.0, 10, true)
    }

    /// Backoff with explicit parameters.
    pub fn with_parameters(offset: f64, base: f64, max_occurrences: u32, randomize: bool) -> Self {
        Self {
            offset,
            base,
            max_occurrences,
            randomize,
            occurrences: 0,
            last_called: Instant::now(),
        }
    }

    /// The next delay to wait before reconnecting.
    pub fn next(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_called);
        self.last_called = now;

        if elapsed.as_secs_f64() > self.duration(self.max_occurrences + 1) {
            self.occurrences = 0;
        }

        let occurrences = self.occurrences;
        if occurrences < self.max_occurrences {
            self.occurrences += 1;
        }

        let mut seconds = self.duration(occurrences);
        if self.randomize {
            seconds += rand::random::<f64>();
        }
        Duration::from_secs_f64(seconds)
    }

    fn duration(&self, occurrences: u32) -> f64 {
        self.offset + self.base.powi(occurrences as i32)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}
