// src/artifact.rs
//! Artifact fetch-and-detect: trigger a side-effecting download, then
//! poll the scratch directory for the resulting file.
//!
//! The protocol distinguishes the triggered download from unrelated and
//! in-progress files: files present before the trigger are snapshotted
//! and excluded, and a candidate with an in-progress sibling marker
//! (`<name>.part`) is not ready yet. When several candidates qualify at
//! once, the most recently modified wins. Timeout is a recoverable
//! absence (`None`), not an error.

use crate::constants::{ARTIFACT_SUFFIX, DELETE_RETRY_DELAY, IN_PROGRESS_SUFFIX};
use crate::error::DriverError;
use crate::error_recovery::{poll_until, remove_with_retry};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Triggers a download and waits for the artifact to land in `dir`.
///
/// Returns `Ok(None)` when nothing qualifying appears within `timeout`.
/// Errors only when the trigger itself fails.
pub async fn fetch_and_wait<F, Fut>(
    dir: &Path,
    trigger: F,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Option<PathBuf>, DriverError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), DriverError>>,
{
    let before = snapshot(dir);

    trigger().await?;

    let found = poll_until(
        || {
            let before = &before;
            async move { detect_new_artifact(dir, before) }
        },
        timeout,
        poll_interval,
    )
    .await;

    if found.is_none() {
        log::debug!(
            "No artifact appeared in {} within {:?}",
            dir.display(),
            timeout
        );
    }
    Ok(found)
}

/// Deletes a consumed artifact, retrying once. Never fails the caller.
pub async fn remove_artifact(path: &Path) {
    remove_with_retry(path, DELETE_RETRY_DELAY).await;
}

/// The set of artifact file names present in `dir` right now.
fn snapshot(dir: &Path) -> HashSet<PathBuf> {
    matching_files(dir).into_iter().collect()
}

/// A newly landed artifact: matches the suffix, absent from the
/// snapshot, no in-progress sibling. Newest mtime wins on ties.
fn detect_new_artifact(dir: &Path, before: &HashSet<PathBuf>) -> Option<PathBuf> {
    matching_files(dir)
        .into_iter()
        .filter(|path| !before.contains(path))
        .filter(|path| !has_in_progress_marker(path))
        .max_by_key(|path| {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        })
}

fn matching_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.to_lowercase().ends_with(ARTIFACT_SUFFIX))
        })
        .collect()
}

fn has_in_progress_marker(path: &Path) -> bool {
    let mut marker = path.as_os_str().to_os_string();
    marker.push(IN_PROGRESS_SUFFIX);
    PathBuf::from(marker).exists()
}
