//! # tiktok-dl
//!
//! Backend library for archiving every video referenced by a TikTok data
//! export.
//!
//! ## Design Philosophy
//!
//! tiktok-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Forgiving of input** - The export format has no schema; parsing
//!   degrades gracefully instead of failing
//! - **Resumable** - A persisted ledger means re-running on the same export
//!   never re-fetches a completed video
//! - **Polite** - A global rate budget and batch pacing keep load on the
//!   upstream service bounded
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tiktok_dl::{Config, Orchestrator, parse_export, ParseOptions, NoOpReporter};
//! # use tiktok_dl::fetcher::MediaFetcher;
//! # fn make_fetcher() -> Arc<dyn MediaFetcher> { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let bytes = std::fs::read("user_data.json")?;
//!     let parsed = parse_export(&bytes, ParseOptions { include_profile: config.include_profile })?;
//!     println!("found {} videos", parsed.counts.total);
//!
//!     let fetcher = make_fetcher(); // wraps your extraction engine
//!     let orchestrator = Orchestrator::new(config, fetcher)?;
//!     let summary = orchestrator.run(parsed.items, Arc::new(NoOpReporter)).await;
//!     println!("{} archived, {} failed", summary.succeeded, summary.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Media fetcher interface (the external fetch/transcode capability)
pub mod fetcher;
/// Persisted ledger of completed downloads
pub mod ledger;
/// Download orchestration (worker pool, batching, dedup)
pub mod orchestrator;
/// Export document parser
pub mod parser;
/// Shared rate budget
pub mod rate_budget;
/// Progress reporting interface
pub mod reporter;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, FetchError, Result};
pub use fetcher::MediaFetcher;
pub use ledger::{Admission, Ledger};
pub use orchestrator::Orchestrator;
pub use parser::{ParseOptions, parse_document, parse_export};
pub use rate_budget::RateBudget;
pub use reporter::{NoOpReporter, ProgressReporter};
pub use types::{
    Category, CategoryCounts, FetchOptions, FetchResult, ParsedExport, RunSummary, WorkItem,
};

/// Helper to run an orchestrator with graceful signal handling.
///
/// Spawns the run, then cancels it cooperatively when the process receives
/// a termination signal. Workers already fetching are allowed to finish.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(
    orchestrator: Orchestrator,
    items: Vec<WorkItem>,
    reporter: std::sync::Arc<dyn ProgressReporter>,
) -> RunSummary {
    let canceller = orchestrator.clone();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        canceller.cancel();
    });

    let summary = orchestrator.run(items, reporter).await;
    signal_task.abort();
    summary
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        _ => {
            tracing::warn!("Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
