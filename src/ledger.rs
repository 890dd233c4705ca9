//! Persisted ledger of completed downloads, plus the per-run in-flight set
//!
//! The ledger is the process-spanning dedup record: a URL enters it only
//! after the external fetch succeeded AND the produced file was verified on
//! disk. It is backed by an append-only `success.log` that is replayed at
//! startup; a companion `error.log` records failures and is write-only at
//! runtime.
//!
//! One `std::sync::Mutex` guards both the completed set and the in-flight
//! set. The lock is held only for O(1) set operations, never across file
//! I/O or an await point. Log appends are serialized through their own
//! per-file mutexes.

use crate::error::{Error, Result};
use crate::types::WorkItem;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key prefixes used in the delimited log-line format
const URL_KEY: &str = "URL:";
const FIELD_DELIMITER: &str = " | ";

/// Decision for one URL at dispatch time, made under the ledger lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Not seen before: the URL was added to the in-flight set; caller must
    /// dispatch a fetch and later call [`Ledger::release`]
    Dispatch,
    /// The URL is already in the completed set
    AlreadyCompleted,
    /// Another worker in this run holds the URL in the in-flight set
    InFlight,
}

/// Sets guarded together by the single ledger lock
struct LedgerState {
    completed: HashSet<String>,
    in_flight: HashSet<String>,
}

/// Durable record of completed downloads and transient in-flight tracking
pub struct Ledger {
    state: Mutex<LedgerState>,
    success_log: Mutex<std::fs::File>,
    error_log: Mutex<std::fs::File>,
    success_path: PathBuf,
}

impl Ledger {
    /// Open (or create) the ledger backed by log files under `logs_dir`.
    ///
    /// Runs the best-effort repair step on the success log, then replays it
    /// to reconstruct the completed set.
    pub fn open(logs_dir: &Path) -> Result<Self> {
        crate::utils::ensure_dir(logs_dir)?;
        let success_path = logs_dir.join("success.log");
        let error_path = logs_dir.join("error.log");

        if repair_log(&success_path)? {
            tracing::warn!(path = %success_path.display(), "Re-encoded success log with invalid UTF-8");
        }
        let completed = replay_success_log(&success_path)?;
        tracing::info!(
            completed = completed.len(),
            path = %success_path.display(),
            "Loaded download ledger"
        );

        let success_log = append_handle(&success_path)?;
        let error_log = append_handle(&error_path)?;

        Ok(Self {
            state: Mutex::new(LedgerState {
                completed,
                in_flight: HashSet::new(),
            }),
            success_log: Mutex::new(success_log),
            error_log: Mutex::new(error_log),
            success_path,
        })
    }

    /// Decide what to do with `url`, atomically against both sets.
    ///
    /// On [`Admission::Dispatch`] the URL has been inserted into the
    /// in-flight set; the caller owns it until [`Ledger::release`].
    pub fn admit(&self, url: &str) -> Admission {
        let mut state = self.lock_state();
        if state.completed.contains(url) {
            return Admission::AlreadyCompleted;
        }
        if !state.in_flight.insert(url.to_string()) {
            return Admission::InFlight;
        }
        Admission::Dispatch
    }

    /// Remove `url` from the in-flight set.
    ///
    /// Called unconditionally when a worker finishes, whatever the outcome,
    /// so a stuck entry can never block retries within the same run.
    pub fn release(&self, url: &str) {
        self.lock_state().in_flight.remove(url);
    }

    /// Whether `url` is in the completed set.
    pub fn contains(&self, url: &str) -> bool {
        self.lock_state().completed.contains(url)
    }

    /// Number of URLs currently in flight.
    pub fn in_flight_len(&self) -> usize {
        self.lock_state().in_flight.len()
    }

    /// Number of completed URLs known to the ledger.
    pub fn completed_len(&self) -> usize {
        self.lock_state().completed.len()
    }

    /// Record a verified success: append to the success log and add the URL
    /// to the completed set.
    ///
    /// The in-memory set is updated even when the append fails; the item was
    /// verified on disk and only durability is degraded. The caller reports
    /// the returned persistence error through its own diagnostic channel.
    pub fn record_success(
        &self,
        item: &WorkItem,
        title: &str,
        id: &str,
        file_path: &Path,
    ) -> Result<()> {
        let line = format!(
            "{} {}{}TITLE: {}{}ID: {}{}CATEGORY: {}{}FILE: {}",
            URL_KEY,
            item.url,
            FIELD_DELIMITER,
            title,
            FIELD_DELIMITER,
            id,
            FIELD_DELIMITER,
            item.source_path,
            FIELD_DELIMITER,
            file_path.display()
        );
        let append_result = self.append(&self.success_log, &line);
        self.lock_state().completed.insert(item.url.clone());
        append_result
    }

    /// Record a failure: append to the error log. The URL is NOT added to
    /// the completed set, so it will be retried on a future run.
    pub fn record_failure(&self, item: &WorkItem, title: &str, id: &str, error: &str) -> Result<()> {
        let line = format!(
            "ERROR: {}{}TITLE: {}{}ID: {}{}CATEGORY: {} - {}",
            item.url, FIELD_DELIMITER, title, FIELD_DELIMITER, id, FIELD_DELIMITER, item.source_path, error
        );
        self.append(&self.error_log, &line)
    }

    /// Path of the backing success log (exposed for tests and embedders)
    pub fn success_log_path(&self) -> &Path {
        &self.success_path
    }

    /// Swap the success-log handle for a read-only one, so every append
    /// fails. Lets tests exercise degraded-durability behavior without
    /// touching filesystem permissions (which would not affect the already
    /// open descriptor).
    #[cfg(test)]
    pub(crate) fn make_success_log_unwritable(&self) -> std::io::Result<()> {
        let read_only = std::fs::File::open(&self.success_path)?;
        *self
            .success_log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = read_only;
        Ok(())
    }

    fn append(&self, log: &Mutex<std::fs::File>, message: &str) -> Result<()> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{}] {}\n", timestamp, message);
        let mut file = log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| Error::Persistence(format!("failed to append log line: {}", e)))
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        // Set operations cannot leave the state inconsistent, so a poisoned
        // lock (worker panic) is safe to recover
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Re-encode a log file that contains invalid UTF-8.
///
/// Historical logs written by other tools occasionally carry broken bytes.
/// Rather than silently dropping those lines at replay time, the file is
/// lossily decoded and rewritten once at startup. Returns whether a rewrite
/// happened. Invoked by [`Ledger::open`]; public so the repair behavior can
/// be exercised on its own.
pub fn repair_log(path: &Path) -> Result<bool> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    match String::from_utf8(bytes) {
        Ok(_) => Ok(false),
        Err(e) => {
            let repaired = String::from_utf8_lossy(e.as_bytes()).into_owned();
            std::fs::write(path, repaired)?;
            Ok(true)
        }
    }
}

/// Rebuild the completed set from the success log.
///
/// Each line carrying a `URL:` key contributes one entry; the URL value runs
/// to the next field delimiter. Lines without the key are ignored.
fn replay_success_log(path: &Path) -> Result<HashSet<String>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e.into()),
    };

    let mut completed = HashSet::new();
    for line in contents.lines() {
        if let Some(url) = parse_url_field(line) {
            completed.insert(url);
        }
    }
    Ok(completed)
}

/// Extract the URL value from one success-log line, if present.
fn parse_url_field(line: &str) -> Option<String> {
    let (_, rest) = line.split_once(URL_KEY)?;
    let value = match rest.find(FIELD_DELIMITER) {
        Some(end) => &rest[..end],
        None => rest,
    };
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn append_handle(path: &Path) -> Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(Error::Io)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use tempfile::tempdir;

    fn item(url: &str) -> WorkItem {
        WorkItem {
            url: url.to_string(),
            destination: PathBuf::from("Likes"),
            category: Category::Likes,
            source_path: "Activity > Like List > ItemFavoriteList".to_string(),
        }
    }

    #[test]
    fn test_open_on_empty_dir_starts_empty() {
        let temp_dir = tempdir().unwrap();
        let ledger = Ledger::open(temp_dir.path()).unwrap();
        assert_eq!(ledger.completed_len(), 0);
        assert_eq!(ledger.in_flight_len(), 0);
    }

    #[test]
    fn test_record_success_then_replay() {
        let temp_dir = tempdir().unwrap();
        {
            let ledger = Ledger::open(temp_dir.path()).unwrap();
            ledger
                .record_success(
                    &item("https://x/1"),
                    "A Title",
                    "12345",
                    Path::new("/videos/12345.mp4"),
                )
                .unwrap();
            assert!(ledger.contains("https://x/1"));
        }

        // Fresh instance replays the log
        let reopened = Ledger::open(temp_dir.path()).unwrap();
        assert!(reopened.contains("https://x/1"));
        assert_eq!(reopened.completed_len(), 1);
    }

    #[test]
    fn test_success_line_format() {
        let temp_dir = tempdir().unwrap();
        let ledger = Ledger::open(temp_dir.path()).unwrap();
        ledger
            .record_success(&item("https://x/1"), "Title", "99", Path::new("out.mp4"))
            .unwrap();

        let contents = std::fs::read_to_string(ledger.success_log_path()).unwrap();
        assert!(contents.contains("URL: https://x/1 | TITLE: Title | ID: 99"));
        assert!(contents.contains("CATEGORY: Activity > Like List > ItemFavoriteList"));
        assert!(contents.contains("FILE: out.mp4"));
    }

    #[test]
    fn test_admission_transitions() {
        let temp_dir = tempdir().unwrap();
        let ledger = Ledger::open(temp_dir.path()).unwrap();

        assert_eq!(ledger.admit("https://x/1"), Admission::Dispatch);
        assert_eq!(ledger.admit("https://x/1"), Admission::InFlight);

        ledger.release("https://x/1");
        assert_eq!(ledger.in_flight_len(), 0);

        ledger
            .record_success(&item("https://x/1"), "T", "1", Path::new("f.mp4"))
            .unwrap();
        assert_eq!(ledger.admit("https://x/1"), Admission::AlreadyCompleted);
    }

    #[test]
    fn test_failed_success_append_still_updates_completed_set() {
        let temp_dir = tempdir().unwrap();
        let ledger = Ledger::open(temp_dir.path()).unwrap();
        ledger.make_success_log_unwritable().unwrap();

        let result = ledger.record_success(&item("https://x/1"), "T", "1", Path::new("f.mp4"));
        assert!(matches!(result, Err(Error::Persistence(_))));

        // The video is on disk and verified; only durability degraded
        assert!(ledger.contains("https://x/1"));
        assert_eq!(ledger.admit("https://x/1"), Admission::AlreadyCompleted);
        let contents = std::fs::read_to_string(ledger.success_log_path()).unwrap();
        assert!(contents.is_empty());
    }

    #[test]
    fn test_failure_is_not_marked_completed() {
        let temp_dir = tempdir().unwrap();
        let ledger = Ledger::open(temp_dir.path()).unwrap();

        ledger
            .record_failure(&item("https://x/bad"), "Unknown Title", "bad", "HTTP 403")
            .unwrap();

        assert!(!ledger.contains("https://x/bad"));
        let contents = std::fs::read_to_string(temp_dir.path().join("error.log")).unwrap();
        assert!(contents.contains("ERROR: https://x/bad"));
        assert!(contents.contains("HTTP 403"));
    }

    #[test]
    fn test_repair_log_reencodes_invalid_utf8() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("success.log");

        let mut bytes = b"[2024-01-01 00:00:00] URL: https://x/1 | TITLE: ".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b" | ID: 1 | CATEGORY: c | FILE: f\n");
        std::fs::write(&path, &bytes).unwrap();

        assert!(repair_log(&path).unwrap());
        // Second pass is a no-op
        assert!(!repair_log(&path).unwrap());

        // The broken title did not cost us the URL
        let ledger = Ledger::open(temp_dir.path()).unwrap();
        assert!(ledger.contains("https://x/1"));
    }

    #[test]
    fn test_repair_log_missing_file_is_noop() {
        let temp_dir = tempdir().unwrap();
        assert!(!repair_log(&temp_dir.path().join("absent.log")).unwrap());
    }

    #[test]
    fn test_replay_ignores_lines_without_url_key() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("success.log");
        std::fs::write(
            &path,
            "some header line\n[2024-01-01 00:00:00] URL: https://x/2 | TITLE: t\nURL:\n",
        )
        .unwrap();

        let ledger = Ledger::open(temp_dir.path()).unwrap();
        assert_eq!(ledger.completed_len(), 1);
        assert!(ledger.contains("https://x/2"));
    }
}
