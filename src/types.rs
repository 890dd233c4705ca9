//! Core types for tiktok-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The export category a video was found under
///
/// Assigned once at parse time and immutable afterwards. The category
/// determines the output folder an item is archived into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Videos the account liked (`Activity > Like List`)
    Likes,
    /// Videos the account favorited (`Activity > Favorite Videos`)
    Favorites,
    /// Videos from browsing history (`Activity > Video Browsing History`)
    History,
    /// Videos the account shared (`Activity > Share History`)
    Shared,
    /// Videos shared inside direct-message conversations
    Chat,
    /// The account's own profile page
    Profile,
}

impl Category {
    /// Output folder name for this category, relative to the output root.
    ///
    /// Chat and profile items extend this with a correspondent or account
    /// name at parse time.
    pub fn folder(&self) -> &'static str {
        match self {
            Category::Likes => "Likes",
            Category::Favorites => "Favorites",
            Category::History => "History",
            Category::Shared => "Shared",
            Category::Chat => "ChatHistory",
            Category::Profile => "UserProfile",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Likes => "likes",
            Category::Favorites => "favorites",
            Category::History => "history",
            Category::Shared => "shared",
            Category::Chat => "chat",
            Category::Profile => "profile",
        };
        write!(f, "{}", name)
    }
}

/// One downloadable unit produced by the export parser
///
/// Created once at parse time, immutable thereafter, and consumed exactly
/// once by the orchestrator (or skipped when the ledger or in-flight set
/// already knows the URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Canonical source URL; non-empty; acts as the dedup key
    pub url: String,
    /// Output directory for this item, relative to the configured output root
    pub destination: PathBuf,
    /// Which export section the item came from
    pub category: Category,
    /// Human-readable provenance, e.g. `"Activity > Like List > ItemFavoriteList"`.
    /// Recorded in the success and error logs.
    pub source_path: String,
}

/// Per-category item counts produced alongside the work-item list
///
/// Purely derived for display purposes: each field counts the items actually
/// produced (entries dropped for lacking a usable URL are not counted), and
/// `total` always equals both the sum of the fields and the length of the
/// returned item list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    /// Items found under `Activity > Like List`
    pub likes: usize,
    /// Items found under `Activity > Favorite Videos`
    pub favorites: usize,
    /// Items found under `Activity > Video Browsing History`
    pub history: usize,
    /// Items found under `Activity > Share History`
    pub shared: usize,
    /// Items extracted from direct-message conversations
    pub chat: usize,
    /// Profile items (0 or 1)
    pub profile: usize,
    /// Sum of all category counts
    pub total: usize,
}

impl CategoryCounts {
    /// Increment the count for `category` and the running total.
    pub(crate) fn bump(&mut self, category: Category) {
        match category {
            Category::Likes => self.likes += 1,
            Category::Favorites => self.favorites += 1,
            Category::History => self.history += 1,
            Category::Shared => self.shared += 1,
            Category::Chat => self.chat += 1,
            Category::Profile => self.profile += 1,
        }
        self.total += 1;
    }
}

/// Everything the export parser produces from one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedExport {
    /// Per-category counts (display only)
    pub counts: CategoryCounts,
    /// Flat, ordered list of downloadable items
    pub items: Vec<WorkItem>,
    /// Account name from the profile section, when present
    pub account: Option<String>,
}

/// Options handed to the external media fetcher for a single fetch
///
/// `timeout_secs` and `max_retries` are passed through verbatim; the
/// orchestrator does not re-implement retry or timeout logic on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Per-worker throughput cap in bytes per second, derived from the
    /// global rate budget and the current concurrency
    pub rate_limit_bps: u64,
    /// Socket timeout in seconds
    pub timeout_secs: u64,
    /// Retry count for the fetcher's internal retry loop
    pub max_retries: u32,
    /// Whether the fetcher should write sidecar metadata and thumbnails
    pub save_metadata: bool,
    /// Output filename template, e.g. `%(id)s.%(ext)s`
    pub output_template: String,
}

/// Result record returned by the external media fetcher on success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    /// Final path of the produced video file
    pub final_path: PathBuf,
    /// Best-effort video title
    pub title: Option<String>,
    /// Best-effort video identifier
    pub id: Option<String>,
}

/// Terminal state of one work item within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The URL was already in the ledger; no fetch dispatched
    SkippedDuplicate,
    /// Another worker in this run was already fetching the URL
    SkippedInFlight,
    /// Fetched, verified on disk, and recorded in the ledger
    Succeeded,
    /// Fetch or local verification failed; will be retried on a future run
    Failed,
}

/// Aggregate outcome of one orchestrator run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total items considered (dispatched or skipped)
    pub total: usize,
    /// Items fetched, verified, and recorded in the ledger
    pub succeeded: usize,
    /// Items that failed fetch or verification
    pub failed: usize,
    /// Items skipped because the ledger already contained the URL
    pub skipped_duplicate: usize,
    /// Items skipped because the URL was being fetched by another worker
    pub skipped_in_flight: usize,
}

impl RunSummary {
    /// Fold one item outcome into the summary.
    pub(crate) fn record(&mut self, outcome: ItemOutcome) {
        self.total += 1;
        match outcome {
            ItemOutcome::SkippedDuplicate => self.skipped_duplicate += 1,
            ItemOutcome::SkippedInFlight => self.skipped_in_flight += 1,
            ItemOutcome::Succeeded => self.succeeded += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_bump_keeps_total_in_sync() {
        let mut counts = CategoryCounts::default();
        counts.bump(Category::Likes);
        counts.bump(Category::Likes);
        counts.bump(Category::Chat);

        assert_eq!(counts.likes, 2);
        assert_eq!(counts.chat, 1);
        assert_eq!(
            counts.total,
            counts.likes
                + counts.favorites
                + counts.history
                + counts.shared
                + counts.chat
                + counts.profile
        );
    }

    #[test]
    fn test_summary_record_covers_all_outcomes() {
        let mut summary = RunSummary::default();
        summary.record(ItemOutcome::Succeeded);
        summary.record(ItemOutcome::Failed);
        summary.record(ItemOutcome::SkippedDuplicate);
        summary.record(ItemOutcome::SkippedInFlight);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped_duplicate, 1);
        assert_eq!(summary.skipped_in_flight, 1);
    }

    #[test]
    fn test_category_display_matches_folder_semantics() {
        assert_eq!(Category::Likes.to_string(), "likes");
        assert_eq!(Category::Likes.folder(), "Likes");
        assert_eq!(Category::Chat.folder(), "ChatHistory");
    }
}
