//! Shared task counter.
//!
//! An explicit handle instead of module-level state, so tests can
//! instantiate independent counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically incrementing counter shared across templating calls.
#[derive(Debug, Default)]
pub struct TaskCounter(AtomicU64);

impl TaskCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Current value, without advancing.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Advance by one and return the new value.
    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}
