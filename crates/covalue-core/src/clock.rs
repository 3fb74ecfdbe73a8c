//! Physical time as an injected effect, not a direct `SystemTime::now()` call.
//!
//! Routing every timestamp through a `Clock` trait — rather than reaching
//! for the system clock at each call site — is what lets `covalue-testkit`
//! supply a deterministic clock in property tests for the merge-order
//! invariants.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the "now" used for `madeAt` timestamps and header creation time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// Production clock backed by the OS wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_millis() as u64
    }
}

/// A clock that always returns the same instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0
    }
}
