//! Progress reporting interface
//!
//! The orchestrator narrates a run through this narrow callback surface;
//! a GUI, CLI, or test harness implements it. The presentation layer never
//! touches the ledger or in-flight set directly — this trait plus the pause
//! and cancel flags are its entire view of a run.

/// Callbacks invoked by the orchestrator as a run progresses
///
/// Implementations must be cheap and non-blocking; they are called from the
/// coordination context and from worker tasks.
pub trait ProgressReporter: Send + Sync {
    /// A batch of `size` items is about to be dispatched
    fn on_batch_start(&self, size: usize);

    /// One item was fetched, verified, and recorded in the ledger
    fn on_item_success(&self, title: &str, id: &str);

    /// One item failed fetch or verification
    fn on_item_failure(&self, title: &str, id: &str, error: &str);

    /// A batch finished; `succeeded` includes duplicate skips, which count
    /// as success for progress purposes
    fn on_batch_end(&self, succeeded: usize, total: usize);
}

/// Reporter that ignores every callback
///
/// Useful for headless runs and tests that only care about the returned
/// [`RunSummary`](crate::types::RunSummary).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl ProgressReporter for NoOpReporter {
    fn on_batch_start(&self, _size: usize) {}
    fn on_item_success(&self, _title: &str, _id: &str) {}
    fn on_item_failure(&self, _title: &str, _id: &str, _error: &str) {}
    fn on_batch_end(&self, _succeeded: usize, _total: usize) {}
}
