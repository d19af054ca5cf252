// src/aggregate.rs
//! Merges per-partition partial results into the final output file.
//!
//! The merge is driven by the expected partition set, not by whatever
//! files happen to exist: every expected partition is looked up by its
//! identity (any worker id qualifies, newest file wins), missing ones
//! are reported rather than silently dropped, and the merged file is
//! written before any partial is deleted, so a crash mid-merge never
//! loses rows. Re-running the merge over the same directory is safe.

use crate::constants::PARTIAL_PREFIX;
use crate::error::HarvestError;
use crate::model::{PartitionIdentity, Record};
use crate::output::{read_records, write_records};
use std::path::{Path, PathBuf};

/// What one merge pass produced.
#[derive(Debug, Default)]
pub struct MergeReport {
    pub merged_files: usize,
    pub rows: usize,
    /// Expected partitions with no partial result on disk.
    pub missing: Vec<String>,
}

impl MergeReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Merges the partial files of `expected` partitions into `output`.
///
/// Partials are deleted only after the merged file has been written.
/// Errors with [`HarvestError::NoResults`] when not a single expected
/// partial exists.
pub fn merge_results(
    work_dir: &Path,
    expected: &[PartitionIdentity],
    output: &Path,
    with_scores: bool,
) -> Result<MergeReport, HarvestError> {
    let mut report = MergeReport::default();
    let mut rows: Vec<Record> = Vec::new();
    let mut consumed: Vec<PathBuf> = Vec::new();

    for identity in expected {
        match find_partial(work_dir, identity) {
            Some(path) => {
                let records = read_records(&path)?;
                log::debug!(
                    "Merging {} ({} row(s)) from {}",
                    identity,
                    records.len(),
                    path.display()
                );
                rows.extend(records);
                consumed.push(path);
                report.merged_files += 1;
            }
            None => {
                log::warn!("No partial result for {}", identity);
                report.missing.push(identity.to_string());
            }
        }
    }

    if report.merged_files == 0 {
        return Err(HarvestError::NoResults {
            expected: expected.len(),
        });
    }

    report.rows = rows.len();
    write_records(output, &rows, with_scores)?;
    log::info!(
        "Merged {} partial file(s), {} row(s) → {}",
        report.merged_files,
        report.rows,
        output.display()
    );

    // The merged file is durable; the partials are now redundant.
    for path in consumed {
        if let Err(e) = std::fs::remove_file(&path) {
            log::warn!("Failed to remove partial {}: {}", path.display(), e);
        }
    }

    Ok(report)
}

/// The newest partial file for `identity`, across any worker id.
fn find_partial(work_dir: &Path, identity: &PartitionIdentity) -> Option<PathBuf> {
    let prefix = format!("{}{}_", PARTIAL_PREFIX, identity.file_stem());

    std::fs::read_dir(work_dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with(&prefix) && n.ends_with(".csv"))
        })
        .max_by_key(|path| {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        })
}
