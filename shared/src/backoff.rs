//! Bounded exponential backoff for reconnect loops

use std::time::Duration;

/// Doubling retry delay capped at a ceiling
///
/// With `initial == max` the delay is flat.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
            attempt: 0,
        }
    }

    /// Flat interval, the behaviour of an unhardened retry loop
    pub fn fixed(interval: Duration) -> Self {
        Self::new(interval, interval)
    }

    /// Record a failed attempt and return how long to wait before the next one
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.attempt = self.attempt.saturating_add(1);
        self.current = std::cmp::min(self.current.saturating_mul(2), self.max);
        delay
    }

    /// Number of consecutive failures since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Reset after a successful attempt
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempt = 0;
    }
}
