//! Exponential backoff with optional jitter.

use rand::Rng;
use std::time::Duration;

/// Delay sequence for one retry run.
///
/// Starts at `initial`, multiplies by `factor` after each step and never
/// exceeds `max`. The sequence is non-decreasing for any `factor >= 1`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            current: initial.min(max),
            max,
            factor: factor.max(1.0),
        }
    }

    /// Delay to wait before the next attempt.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Return the current delay and advance the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let scaled = (self.current.as_nanos() as f64 * self.factor).round();
        self.current = if scaled.is_finite() && scaled < self.max.as_nanos() as f64 {
            Duration::from_nanos(scaled as u64)
        } else {
            self.max
        };
        delay
    }
}

/// Add 0–10% random jitter on top of `delay`.
pub fn with_jitter(delay: Duration) -> Duration {
    let jitter_range = delay.as_millis() as u64 / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };
    delay + Duration::from_millis(jitter)
}
