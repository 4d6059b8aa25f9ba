//! Pass/fail bookkeeping for invocation responses.

use std::sync::atomic::{AtomicU64, Ordering};

/// Pass/fail counters of the response checks in one phase.
///
/// Shared by all virtual users of the phase.
#[derive(Debug, Default)]
pub struct Checks {
    passed: AtomicU64,
    failed: AtomicU64,
}

impl Checks {
    /// Records the outcome of one check.
    pub fn record(&self, passed: bool) {
        let counter = if passed { &self.passed } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of passed checks.
    pub fn passed(&self) -> u64 {
        self.passed.load(Ordering::Relaxed)
    }

    /// Number of failed checks.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Total number of checks.
    pub fn total(&self) -> u64 {
        self.passed() + self.failed()
    }
}
