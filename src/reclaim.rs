// src/reclaim.rs
//! Stale scratch-directory reclamation.
//!
//! Workers that crash or are killed leave their scratch directories
//! behind. The reclaimer scans the known scratch roots and removes every
//! directory matching the scratch-naming convention that is not in the
//! live set. It runs opportunistically — piggybacking on checkpoint
//! writes and once at the end of the run — and is safe to run from
//! several workers at once: the live set covers all currently-owned
//! directories, and deleting an already-deleted directory is a no-op.

use crate::constants::SCRATCH_PREFIX;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// What a reclamation pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    pub directories_removed: usize,
    pub bytes_reclaimed: u64,
}

impl ReclaimReport {
    pub fn is_empty(&self) -> bool {
        self.directories_removed == 0
    }
}

impl std::fmt::Display for ReclaimReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} scratch dir(s), ~{:.1} MB",
            self.directories_removed,
            self.bytes_reclaimed as f64 / (1024.0 * 1024.0)
        )
    }
}

/// Removes stale scratch directories under `roots`, sparing `live`.
pub fn reclaim_scratch(roots: &[PathBuf], live: &HashSet<PathBuf>) -> ReclaimReport {
    let mut report = ReclaimReport::default();

    for root in roots {
        let Ok(entries) = std::fs::read_dir(root) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_scratch_dir(&path) || live.contains(&path) {
                continue;
            }

            let size = dir_size(&path);
            match std::fs::remove_dir_all(&path) {
                Ok(()) => {
                    log::info!("Reclaimed stale scratch dir: {}", path.display());
                    report.directories_removed += 1;
                    report.bytes_reclaimed += size;
                }
                // A sibling pass may have won the race; anything else is
                // logged and skipped.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to reclaim {}: {}", path.display(), e),
            }
        }
    }

    if !report.is_empty() {
        log::info!("Reclaimed {}", report);
    }
    report
}

fn is_scratch_dir(path: &Path) -> bool {
    path.is_dir()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with(SCRATCH_PREFIX))
}

fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let p = entry.path();
            if p.is_dir() {
                dir_size(&p)
            } else {
                std::fs::metadata(&p).map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}
