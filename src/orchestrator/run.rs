//! The batch loop and per-item fetch workers.

use super::Orchestrator;
use crate::error::FetchError;
use crate::ledger::Admission;
use crate::reporter::ProgressReporter;
use crate::types::{ItemOutcome, RunSummary, WorkItem};
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Title used in log lines when the fetcher produced none
const UNKNOWN_TITLE: &str = "Unknown Title";

impl Orchestrator {
    /// Run the orchestrator over an ordered list of work items.
    ///
    /// Items are processed in batches of `batch_size`, strictly
    /// sequentially; within a batch up to `concurrency` fetches run at
    /// once. Each item ends in exactly one terminal state — succeeded,
    /// failed, skipped-duplicate, or skipped-in-flight — and every outcome
    /// is observable through the reporter and the ledger logs.
    ///
    /// Item-level failures never escalate out of their worker, so this
    /// method is infallible; fatal conditions (bad document, missing
    /// transcoder) were rejected before a `run` could start. After it
    /// returns, whether normally or via cancellation, the in-flight set is
    /// empty.
    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let batch_count = items.len().div_ceil(self.config.batch_size.max(1));

        for (batch_index, batch) in items.chunks(self.config.batch_size).enumerate() {
            self.wait_while_paused().await;
            if self.cancel_token.is_cancelled() {
                tracing::info!(
                    batch = batch_index + 1,
                    batch_count,
                    "Cancelled before batch start"
                );
                break;
            }

            tracing::info!(
                batch = batch_index + 1,
                batch_count,
                items = batch.len(),
                "Processing batch"
            );
            reporter.on_batch_start(batch.len());

            let batch_outcomes = self.process_batch(batch, &reporter).await;

            // Duplicate and in-flight skips count as success for progress
            // purposes: the video is (or is about to be) archived.
            let batch_succeeded = batch_outcomes
                .iter()
                .filter(|outcome| !matches!(outcome, ItemOutcome::Failed))
                .count();
            reporter.on_batch_end(batch_succeeded, batch_outcomes.len());
            tracing::info!(
                batch = batch_index + 1,
                succeeded = batch_succeeded,
                total = batch_outcomes.len(),
                "Batch complete"
            );

            for outcome in batch_outcomes {
                summary.record(outcome);
            }

            // Short pause between batches to avoid bursting the upstream
            // service
            let last_batch = batch_index + 1 == batch_count;
            if !last_batch && !self.cancel_token.is_cancelled() {
                tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
        }

        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped_duplicate = summary.skipped_duplicate,
            skipped_in_flight = summary.skipped_in_flight,
            "Run finished"
        );
        summary
    }

    /// Dispatch one batch across the worker pool and join all workers.
    ///
    /// Returns the terminal outcome of every item that was considered
    /// (items never reached because cancellation struck mid-batch are not
    /// included).
    async fn process_batch(
        &self,
        batch: &[WorkItem],
        reporter: &Arc<dyn ProgressReporter>,
    ) -> Vec<ItemOutcome> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.concurrency));
        let mut outcomes = Vec::with_capacity(batch.len());
        let mut handles: Vec<(String, JoinHandle<ItemOutcome>)> = Vec::new();

        for item in batch {
            self.wait_while_paused().await;
            if self.cancel_token.is_cancelled() {
                tracing::info!("Cancelled mid-batch; letting dispatched workers finish");
                break;
            }

            // Ledger membership and in-flight insertion are decided in one
            // critical section, so two workers can never race on a URL.
            match self.ledger.admit(&item.url) {
                Admission::AlreadyCompleted => {
                    tracing::info!(url = %item.url, "Skipping already downloaded video");
                    outcomes.push(ItemOutcome::SkippedDuplicate);
                }
                Admission::InFlight => {
                    tracing::info!(url = %item.url, "Skipping video already being downloaded");
                    outcomes.push(ItemOutcome::SkippedInFlight);
                }
                Admission::Dispatch => {
                    let orchestrator = self.clone();
                    let item = item.clone();
                    let reporter = Arc::clone(reporter);
                    let semaphore = Arc::clone(&semaphore);
                    let url = item.url.clone();

                    let handle = tokio::spawn(async move {
                        let outcome = match semaphore.acquire_owned().await {
                            Ok(_permit) => {
                                orchestrator.fetch_one(&item, reporter.as_ref()).await
                            }
                            // The semaphore is never closed while workers run
                            Err(_) => ItemOutcome::Failed,
                        };
                        orchestrator.ledger.release(&item.url);
                        outcome
                    });
                    handles.push((url, handle));
                }
            }
        }

        // Join barrier: the next batch never starts until every worker in
        // this one has returned.
        let (urls, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (url, joined) in urls.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_error) => {
                    // The worker never reached its own release
                    self.ledger.release(&url);
                    tracing::error!(url = %url, error = %join_error, "Download worker panicked");
                    outcomes.push(ItemOutcome::Failed);
                }
            }
        }

        outcomes
    }

    /// Fetch a single item and verify the result.
    ///
    /// Holds no locks across the fetch call; ledger updates happen after the
    /// outcome is known. The caller removes the URL from the in-flight set.
    async fn fetch_one(&self, item: &WorkItem, reporter: &dyn ProgressReporter) -> ItemOutcome {
        let destination = self.config.output_root.join(&item.destination);
        if let Err(e) = crate::utils::ensure_dir(&destination) {
            return self.fail_item(
                item,
                reporter,
                &format!("failed to create destination folder: {}", e),
                None,
                None,
            );
        }

        let options = self.fetch_options();
        tracing::debug!(
            url = %item.url,
            destination = %destination.display(),
            rate_limit_bps = options.rate_limit_bps,
            "Dispatching fetch"
        );

        match self.fetcher.fetch(&item.url, &destination, &options).await {
            Ok(result) => {
                // Never trust a reported success without the file on disk
                if !result.final_path.exists() {
                    let error = FetchError::OutputMissing {
                        path: result.final_path.clone(),
                    };
                    return self.fail_item(item, reporter, &error.to_string(), result.title, result.id);
                }

                let title = result.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string());
                let id = result.id.unwrap_or_else(|| fallback_id(&item.url));

                if self.config.save_metadata {
                    let metadata_dir = destination.join("metadata");
                    if let Err(e) =
                        crate::utils::move_sidecar_files(&result.final_path, &metadata_dir)
                    {
                        tracing::warn!(url = %item.url, error = %e, "Failed to move sidecar files");
                    }
                }

                if let Err(e) = self
                    .ledger
                    .record_success(item, &title, &id, &result.final_path)
                {
                    tracing::warn!(url = %item.url, error = %e, "Failed to persist success record");
                }

                reporter.on_item_success(&title, &id);
                tracing::info!(url = %item.url, title = %title, "Download complete");
                ItemOutcome::Succeeded
            }
            Err(e) => self.fail_item(item, reporter, &e.to_string(), None, None),
        }
    }

    /// Record one item failure in the error log and notify the reporter.
    fn fail_item(
        &self,
        item: &WorkItem,
        reporter: &dyn ProgressReporter,
        error: &str,
        title: Option<String>,
        id: Option<String>,
    ) -> ItemOutcome {
        let title = title.unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let id = id.unwrap_or_else(|| fallback_id(&item.url));

        if let Err(persist) = self.ledger.record_failure(item, &title, &id, error) {
            tracing::warn!(url = %item.url, error = %persist, "Failed to persist error record");
        }

        reporter.on_item_failure(&title, &id, error);
        tracing::error!(url = %item.url, error = %error, "Download failed");
        ItemOutcome::Failed
    }

    /// Block while the pause flag is set, polling on the configured
    /// interval. Cancellation takes precedence over pause.
    async fn wait_while_paused(&self) {
        if !self.paused.load(Ordering::SeqCst) {
            return;
        }
        tracing::info!("Paused; waiting to resume");
        let interval = Duration::from_millis(self.config.pause_poll_ms.max(1));
        while self.paused.load(Ordering::SeqCst) && !self.cancel_token.is_cancelled() {
            tokio::time::sleep(interval).await;
        }
    }
}

/// Best-effort identifier for a URL with no fetcher-reported id: its last
/// path segment.
fn fallback_id(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((_, id)) if !id.is_empty() => id.to_string(),
        _ => "Unknown ID".to_string(),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod unit_tests {
    use super::fallback_id;

    #[test]
    fn test_fallback_id_uses_last_path_segment() {
        assert_eq!(
            fallback_id("https://www.tiktokv.com/share/video/123"),
            "123"
        );
        assert_eq!(fallback_id("no-slashes-here"), "Unknown ID");
        assert_eq!(fallback_id("trailing/"), "Unknown ID");
    }
}
