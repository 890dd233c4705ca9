//! Download orchestrator
//!
//! Owns the worker pool, the ledger, and the in-flight set for one run.
//! Split into focused submodules:
//! - this module — construction, preconditions, and the pause/cancel
//!   control surface
//! - [`run`](self) (`run.rs`) — the batch loop and per-item workers
//!
//! There are no process-wide singletons: every orchestrator value owns its
//! own ledger handle and flags, and workers reach them through cloned
//! `Arc`s. The presentation layer interacts with a run only through
//! `pause`/`resume`/`cancel` and the
//! [`ProgressReporter`](crate::reporter::ProgressReporter) callbacks.

mod run;


use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::MediaFetcher;
use crate::ledger::Ledger;
use crate::rate_budget::RateBudget;
use crate::types::FetchOptions;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Orchestrates fetching a list of work items across a bounded worker pool
/// (cloneable — all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Orchestrator {
    /// Configuration (shared across worker tasks)
    pub(crate) config: Arc<Config>,
    /// Completed-set + in-flight-set + backing logs
    pub(crate) ledger: Arc<Ledger>,
    /// Shared rate budget dividing total bandwidth across workers
    pub(crate) rate_budget: RateBudget,
    /// External fetch/transcode capability
    pub(crate) fetcher: Arc<dyn MediaFetcher>,
    /// Cooperative cancellation, polled before each batch and each dispatch
    pub(crate) cancel_token: CancellationToken,
    /// Cooperative pause, polled at the same points on a fixed interval
    pub(crate) paused: Arc<AtomicBool>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create a new orchestrator.
    ///
    /// Fatal preconditions are checked here, once, rather than per item:
    /// the configuration must validate and the fetcher must report itself
    /// ready (a fetcher missing its transcoder binary fails construction).
    /// Also creates the output tree and opens the ledger, replaying the
    /// success log from any prior run.
    pub fn new(config: Config, fetcher: Arc<dyn MediaFetcher>) -> Result<Self> {
        config.validate()?;

        if !fetcher.is_ready() {
            return Err(Error::Precondition(format!(
                "media fetcher '{}' is not ready; is its transcoder installed?",
                fetcher.name()
            )));
        }

        crate::utils::ensure_dir(&config.output_root)?;
        let logs_dir = config.output_root.join("logs");
        let ledger = Ledger::open(&logs_dir)?;

        let rate_budget = RateBudget::new(
            config.total_rate_bps,
            config.rate_floor_bps,
            config.concurrency,
        );

        tracing::info!(
            output_root = %config.output_root.display(),
            concurrency = config.concurrency,
            batch_size = config.batch_size,
            fetcher = fetcher.name(),
            "Orchestrator initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            ledger: Arc::new(ledger),
            rate_budget,
            fetcher,
            cancel_token: CancellationToken::new(),
            paused: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Pause the run at the next batch or dispatch boundary.
    ///
    /// In-flight fetches are not interrupted and queued work is neither
    /// dropped nor duplicated; progression simply stops until [`resume`].
    ///
    /// [`resume`]: Orchestrator::resume
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        tracing::info!("Run paused");
    }

    /// Resume a paused run.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        tracing::info!("Run resumed");
    }

    /// Whether the run is currently paused
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Request cooperative cancellation.
    ///
    /// Workers already fetching are allowed to finish (the underlying fetch
    /// is not interruptible mid-transfer); no new batch or dispatch starts
    /// after the flag is observed. Worst-case shutdown latency is therefore
    /// one in-flight fetch per worker slot.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
        tracing::info!("Run cancellation requested");
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// The ledger backing this orchestrator
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The shared rate budget (adjustable mid-run)
    pub fn rate_budget(&self) -> &RateBudget {
        &self.rate_budget
    }

    /// Fetch options for the next dispatch, with the per-worker rate cap
    /// derived from the current budget.
    pub(crate) fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            rate_limit_bps: self.rate_budget.per_worker_bps(),
            timeout_secs: self.config.timeout_secs,
            max_retries: self.config.max_retries,
            save_metadata: self.config.save_metadata,
            output_template: self.config.output_template.clone(),
        }
    }
}
