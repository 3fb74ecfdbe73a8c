//! Reconnection backoff for external transport adapters.
//!
//! The sync manager itself is connection-agnostic; adapters that reconnect
//! a dropped peer channel use this to pace retries without hammering the
//! remote end.

use std::time::Duration;

/// Exponential backoff, doubling from an initial delay up to a cap, reset
/// to the initial delay by [`Backoff::reset`] on a network-up signal.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Build a backoff starting at `initial`, doubling each call to
    /// [`Self::next_delay`] up to `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// The engine's default: 250ms initial, capped at 30s.
    pub fn default_capped_at_30s() -> Self {
        Self::new(Duration::from_millis(250), Duration::from_secs(30))
    }

    /// The delay to wait before the next reconnect attempt, doubling for
    /// the one after that.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Reset to the initial delay, e.g. on an OS network-up notification.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
