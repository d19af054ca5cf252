// src/checkpoint.rs
//! Periodic durable snapshots of a partition's progress, and resume.
//!
//! A checkpoint holds exactly the first M processed records of the
//! partition — a prefix of its eventual final result — and is
//! idempotently overwritten in place every K records. Checkpoints are
//! advisory for progress visibility; with `--resume` they additionally
//! let a re-run of a crashed partition skip the records a previous
//! worker already covered. Resume matches on partition identity alone
//! (the worker id differs across runs).

use crate::constants::CHECKPOINT_PREFIX;
use crate::error::HarvestError;
use crate::model::{PartitionIdentity, Record, WorkerId};
use crate::output::{checkpoint_path, read_records, write_records};
use std::path::{Path, PathBuf};

pub struct CheckpointWriter {
    work_dir: PathBuf,
    identity: PartitionIdentity,
    worker: WorkerId,
    every: usize,
    with_scores: bool,
}

impl CheckpointWriter {
    pub fn new(
        work_dir: &Path,
        identity: PartitionIdentity,
        worker: WorkerId,
        every: usize,
        with_scores: bool,
    ) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            identity,
            worker,
            every,
            with_scores,
        }
    }

    /// Whether a checkpoint is due after `processed` records.
    pub fn is_due(&self, processed: usize) -> bool {
        self.every > 0 && processed > 0 && processed % self.every == 0
    }

    /// Overwrites this partition's checkpoint with the processed prefix.
    pub fn write(&self, processed_prefix: &[Record]) -> Result<PathBuf, HarvestError> {
        let path = self.path();
        write_records(&path, processed_prefix, self.with_scores)?;
        log::info!(
            "Checkpoint: {} at {} record(s)",
            self.identity,
            processed_prefix.len()
        );
        Ok(path)
    }

    /// Removes the checkpoint once the partition's final result exists;
    /// a leftover checkpoint would look resumable on the next run.
    pub fn remove(&self) {
        let path = self.path();
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Failed to remove checkpoint {}: {}", path.display(), e);
            }
        }
    }

    pub fn path(&self) -> PathBuf {
        checkpoint_path(&self.work_dir, &self.identity, &self.worker)
    }
}

/// Looks for a previous run's checkpoint of this partition and returns
/// its records — the already-covered prefix.
///
/// When several checkpoints exist (runs under different worker ids), the
/// most recently modified one wins. A checkpoint that does not line up
/// with the partition's records (different URLs, or longer than the
/// partition) is ignored rather than trusted.
pub fn find_resume_prefix(
    work_dir: &Path,
    identity: &PartitionIdentity,
    records: &[Record],
) -> Result<Option<Vec<Record>>, HarvestError> {
    let prefix = format!("{}{}_", CHECKPOINT_PREFIX, identity.file_stem());

    let candidates: Vec<PathBuf> = match std::fs::read_dir(work_dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .map_or(false, |n| n.starts_with(&prefix) && n.ends_with(".csv"))
            })
            .collect(),
        Err(_) => return Ok(None),
    };
    let Some(newest) = candidates.into_iter().max_by_key(|p| {
        std::fs::metadata(p)
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
    }) else {
        return Ok(None);
    };

    let covered = read_records(&newest)?;
    if covered.len() > records.len() {
        log::warn!(
            "Ignoring checkpoint {} — longer than the partition",
            newest.display()
        );
        return Ok(None);
    }
    let aligned = covered
        .iter()
        .zip(records)
        .all(|(covered, fresh)| covered.page_url == fresh.page_url);
    if !aligned {
        log::warn!(
            "Ignoring checkpoint {} — records do not match the partition",
            newest.display()
        );
        return Ok(None);
    }

    log::info!(
        "Resuming {} from checkpoint {} ({} record(s) covered)",
        identity,
        newest.display(),
        covered.len()
    );
    Ok(Some(covered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupKey;
    use pretty_assertions::assert_eq;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(format!("http://p/{}", i), GroupKey::new("CA"), None))
            .collect()
    }

    fn identity() -> PartitionIdentity {
        PartitionIdentity::new(GroupKey::new("CA"), 0, 2)
    }

    #[test]
    fn cadence_fires_every_k_records() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CheckpointWriter::new(dir.path(), identity(), WorkerId::fixed("w1"), 5, true);

        assert!(!writer.is_due(0));
        assert!(!writer.is_due(4));
        assert!(writer.is_due(5));
        assert!(!writer.is_due(6));
        assert!(writer.is_due(10));
    }

    #[test]
    fn zero_interval_disables_checkpointing() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CheckpointWriter::new(dir.path(), identity(), WorkerId::fixed("w1"), 0, true);
        assert!(!writer.is_due(200));
    }

    #[test]
    fn checkpoint_holds_the_processed_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CheckpointWriter::new(dir.path(), identity(), WorkerId::fixed("w1"), 2, true);
        let mut partition = records(6);
        for (i, record) in partition.iter_mut().enumerate() {
            record.fields.push_form_name(format!("Form {}", i));
        }

        let path = writer.write(&partition[..4]).unwrap();
        let persisted = read_records(&path).unwrap();

        assert_eq!(persisted, partition[..4].to_vec());
    }

    #[test]
    fn checkpoints_are_idempotently_overwritable() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CheckpointWriter::new(dir.path(), identity(), WorkerId::fixed("w1"), 2, true);
        let partition = records(6);

        writer.write(&partition[..2]).unwrap();
        let path = writer.write(&partition[..4]).unwrap();

        assert_eq!(read_records(&path).unwrap().len(), 4);
    }

    #[test]
    fn resume_finds_checkpoint_from_another_worker() {
        let dir = tempfile::tempdir().unwrap();
        let partition = records(6);

        let old_run = CheckpointWriter::new(dir.path(), identity(), WorkerId::fixed("dead"), 2, true);
        old_run.write(&partition[..4]).unwrap();

        let covered = find_resume_prefix(dir.path(), &identity(), &partition)
            .unwrap()
            .expect("checkpoint should be found");
        assert_eq!(covered.len(), 4);
        assert_eq!(covered[0].page_url, "http://p/0");
    }

    #[test]
    fn resume_ignores_checkpoint_of_other_partition() {
        let dir = tempfile::tempdir().unwrap();
        let partition = records(6);

        let other = PartitionIdentity::new(GroupKey::new("CA"), 1, 2);
        CheckpointWriter::new(dir.path(), other, WorkerId::fixed("dead"), 2, true)
            .write(&partition[..2])
            .unwrap();

        let found = find_resume_prefix(dir.path(), &identity(), &partition).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn resume_rejects_mismatched_records() {
        let dir = tempfile::tempdir().unwrap();
        let partition = records(6);

        let mut foreign = records(3);
        foreign[1].page_url = "http://somewhere/else".to_string();
        CheckpointWriter::new(dir.path(), identity(), WorkerId::fixed("dead"), 2, true)
            .write(&foreign)
            .unwrap();

        let found = find_resume_prefix(dir.path(), &identity(), &partition).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn remove_deletes_the_checkpoint_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CheckpointWriter::new(dir.path(), identity(), WorkerId::fixed("w1"), 2, true);
        let path = writer.write(&records(2)).unwrap();
        assert!(path.exists());

        writer.remove();
        assert!(!path.exists());
    }
}
