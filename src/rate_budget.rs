//! Global rate budget shared across concurrent workers
//!
//! The budget divides a total bytes-per-second ceiling evenly across the
//! current number of workers. The division itself is a pure function
//! ([`RateBudget::derive`]); the struct adds lock-free runtime adjustment so
//! an embedder can change either input mid-run and have the next dispatch
//! pick up the new per-worker cap.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Shared rate budget (cheap to clone, all state behind atomics)
#[derive(Clone)]
pub struct RateBudget {
    /// Total throughput ceiling in bytes per second
    total_bps: Arc<AtomicU64>,
    /// Floor the total is clamped to before division
    floor_bps: u64,
    /// Current worker concurrency
    concurrency: Arc<AtomicUsize>,
}

impl RateBudget {
    /// Create a budget from a total rate, a floor, and a concurrency level.
    #[must_use]
    pub fn new(total_bps: u64, floor_bps: u64, concurrency: usize) -> Self {
        Self {
            total_bps: Arc::new(AtomicU64::new(total_bps)),
            floor_bps,
            concurrency: Arc::new(AtomicUsize::new(concurrency)),
        }
    }

    /// Pure derivation: per-worker rate for a given total and concurrency.
    ///
    /// `concurrency` is clamped to a minimum of 1 before division;
    /// `total_bps` is clamped to `floor_bps`. Monotonically non-increasing
    /// in `concurrency` for a fixed total.
    #[must_use]
    pub fn derive(total_bps: u64, floor_bps: u64, concurrency: usize) -> u64 {
        let total = total_bps.max(floor_bps);
        total / concurrency.max(1) as u64
    }

    /// Current per-worker rate in bytes per second.
    #[must_use]
    pub fn per_worker_bps(&self) -> u64 {
        Self::derive(
            self.total_bps.load(Ordering::Relaxed),
            self.floor_bps,
            self.concurrency.load(Ordering::Relaxed),
        )
    }

    /// Change the total budget. Takes effect on the next derivation.
    pub fn set_total_bps(&self, total_bps: u64) {
        self.total_bps.store(total_bps, Ordering::Relaxed);
    }

    /// Change the concurrency input. Takes effect on the next derivation.
    pub fn set_concurrency(&self, concurrency: usize) {
        self.concurrency.store(concurrency, Ordering::Relaxed);
    }
}
