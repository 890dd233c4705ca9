//! Utility functions for file operations and path manipulation

use std::path::{Path, PathBuf};

/// Remove characters that are invalid in file and folder names.
///
/// Strips `< > : " / \ | ? *` and control characters, then trims surrounding
/// whitespace. Used for chat correspondent names and account names, which
/// come straight out of the export document.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Create a directory and all parents, tolerating concurrent creation.
///
/// Safe to call from multiple workers racing on the same folder: an
/// `AlreadyExists` outcome is success.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Sidecar files the fetcher writes next to a video, relative to its stem
const SIDECAR_SUFFIXES: [&str; 2] = ["info.json", "jpg"];

/// Move sidecar metadata/thumbnail files produced alongside a video into
/// `metadata_dir`.
///
/// Looks for `<stem>.info.json` and `<stem>.jpg` next to `video_path`.
/// Missing sidecars are not an error; a failed move is reported to the
/// caller so it can be logged without failing the item.
pub fn move_sidecar_files(video_path: &Path, metadata_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let Some(stem) = video_path.file_stem() else {
        return Ok(Vec::new());
    };
    let Some(parent) = video_path.parent() else {
        return Ok(Vec::new());
    };

    ensure_dir(metadata_dir)?;

    let mut moved = Vec::new();
    for suffix in SIDECAR_SUFFIXES {
        let sidecar = parent.join(format!("{}.{}", stem.to_string_lossy(), suffix));
        if !sidecar.exists() {
            continue;
        }
        let Some(file_name) = sidecar.file_name() else {
            continue;
        };
        let target = metadata_dir.join(file_name);
        std::fs::rename(&sidecar, &target)?;
        moved.push(target);
    }
    Ok(moved)
}
