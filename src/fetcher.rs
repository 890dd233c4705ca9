//! Media fetcher interface
//!
//! The actual network retrieval and transcoding is an external capability:
//! given a URL and a destination folder, a [`MediaFetcher`] returns a result
//! record with the final file path and best-effort title/id metadata, or a
//! [`FetchError`]. The orchestrator verifies the reported file on disk
//! itself; implementations are free to lie, but lies don't reach the ledger.
//!
//! Implementations can wrap an extraction engine (yt-dlp or similar), an
//! HTTP client, or a stub for tests.

use crate::error::FetchError;
use crate::types::{FetchOptions, FetchResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Trait for the external video fetch/transcode capability
///
/// # Examples
///
/// ```no_run
/// use tiktok_dl::fetcher::MediaFetcher;
/// use tiktok_dl::types::{FetchOptions, FetchResult};
/// use tiktok_dl::error::FetchError;
/// use async_trait::async_trait;
/// use std::path::Path;
///
/// struct MyFetcher;
///
/// #[async_trait]
/// impl MediaFetcher for MyFetcher {
///     async fn fetch(
///         &self,
///         url: &str,
///         destination: &Path,
///         options: &FetchOptions,
///     ) -> Result<FetchResult, FetchError> {
///         // invoke the extraction engine here
///         Err(FetchError::Failed {
///             url: url.to_string(),
///             reason: "not implemented".to_string(),
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch one video into `destination`.
    ///
    /// `options` carries the per-worker rate cap, timeout, retry count, and
    /// metadata settings; the fetcher applies them internally. The call may
    /// take seconds to minutes and is not interruptible mid-transfer.
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> Result<FetchResult, FetchError>;

    /// Whether the fetcher's own preconditions hold (e.g. its transcoder
    /// binary exists). Checked once at orchestrator construction; an unready
    /// fetcher is a fatal precondition error, not a per-item failure.
    fn is_ready(&self) -> bool {
        true
    }

    /// Short implementation name for diagnostics
    fn name(&self) -> &str {
        "fetcher"
    }
}

/// Attempt to find a working `ffmpeg` transcoder in PATH.
///
/// Convenience for fetcher implementations that shell out to an extraction
/// engine needing a transcoder. Returns `None` when the binary is absent.
pub fn find_transcoder() -> Option<PathBuf> {
    which::which("ffmpeg").ok()
}
