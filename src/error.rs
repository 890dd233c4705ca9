//! Error types for tiktok-dl
//!
//! The taxonomy follows how errors propagate at runtime:
//! - [`Error::Document`] and [`Error::Precondition`] are fatal and surface to
//!   the caller before any item is processed
//! - [`FetchError`] is recovered per item (logged, counted, run continues)
//! - [`Error::Persistence`] is best-effort: log-file write failures are
//!   reported through `tracing` but never abort a run

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tiktok-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tiktok-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unreadable export document. Fatal to the run; surfaced
    /// at the parser boundary before any items are produced.
    #[error("invalid export document: {message}")]
    Document {
        /// Human-readable description of what made the document unusable
        message: String,
    },

    /// Required external capability unavailable (e.g. no working transcoder).
    /// Fatal at orchestrator construction, never per item.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g. "batch_size")
        key: Option<String>,
    },

    /// Failure fetching, extracting, or locally verifying one item
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Failure writing to a ledger log file (best-effort durability)
    #[error("persistence error: {0}")]
    Persistence(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Item-level fetch errors
///
/// Every variant is fully recovered inside the worker that hit it: the item
/// is marked failed, a line is appended to the error log, and the run moves
/// on. The item is not added to the ledger, so a future run retries it.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum FetchError {
    /// The external fetcher reported a failure (network, extraction, transcode)
    #[error("fetcher failed for {url}: {reason}")]
    Failed {
        /// The URL that could not be fetched
        url: String,
        /// The fetcher's error message, verbatim
        reason: String,
    },

    /// The fetcher reported success but the output file does not exist on disk
    #[error("fetcher reported success but {path} does not exist")]
    OutputMissing {
        /// The path the fetcher claimed to have written
        path: PathBuf,
    },

    /// The fetch did not complete within the configured timeout
    #[error("fetch timed out after {seconds}s for {url}")]
    TimedOut {
        /// The URL whose fetch timed out
        url: String,
        /// The timeout that was exceeded, in seconds
        seconds: u64,
    },
}
