// src/worker.rs
//! One worker: consumes one partition end-to-end.
//!
//! A worker owns its page driver, its session and its scratch directory
//! exclusively for the partition's lifetime. Whatever happens inside —
//! success, a partition-fatal error, a skipped tail — the scratch
//! directory is removed and the session released before the worker
//! returns. The only shared state is the live-scratch registry, which
//! exists so reclamation passes never touch a sibling's directory.

use crate::checkpoint::{find_resume_prefix, CheckpointWriter};
use crate::constants::SCRATCH_PREFIX;
use crate::driver::DriverFactory;
use crate::error::{DriverError, PartitionError};
use crate::extract::{ExtractionPipeline, PartitionStats, PipelineTuning};
use crate::model::{PartitionIdentity, WorkUnit, WorkerId};
use crate::output::{partial_path, write_records};
use crate::reclaim::reclaim_scratch;
use crate::score::{ReadabilityScore, TextExtract};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Everything a worker needs, shared read-only across the pool.
pub struct WorkerEnv {
    pub factory: Arc<dyn DriverFactory>,
    pub extractor: Arc<dyn TextExtract>,
    pub scorer: Arc<dyn ReadabilityScore>,
    pub tuning: PipelineTuning,
    /// Where checkpoints and partial results are written.
    pub work_dir: PathBuf,
    /// Root under which per-worker scratch directories are created.
    pub scratch_root: PathBuf,
    pub checkpoint_every: usize,
    pub resume: bool,
    /// Scratch directories currently owned by running workers. The
    /// reclaimer must never delete anything in this set.
    pub live_scratch: Mutex<HashSet<PathBuf>>,
}

impl WorkerEnv {
    fn register_scratch(&self, dir: &PathBuf) {
        self.live_scratch
            .lock()
            .expect("live-scratch registry poisoned")
            .insert(dir.clone());
    }

    fn unregister_scratch(&self, dir: &PathBuf) {
        self.live_scratch
            .lock()
            .expect("live-scratch registry poisoned")
            .remove(dir);
    }

    fn live_set(&self) -> HashSet<PathBuf> {
        self.live_scratch
            .lock()
            .expect("live-scratch registry poisoned")
            .clone()
    }
}

/// What one completed worker hands back to the dispatcher.
#[derive(Debug)]
pub struct PartitionReport {
    pub identity: PartitionIdentity,
    pub worker: WorkerId,
    pub result_file: PathBuf,
    pub stats: PartitionStats,
    /// Records skipped because a resume checkpoint already covered them.
    pub resumed: usize,
}

/// Runs one partition to completion in isolation.
pub async fn run_partition(
    unit: WorkUnit,
    env: Arc<WorkerEnv>,
) -> Result<PartitionReport, PartitionError> {
    let worker = WorkerId::random();
    let identity = unit.identity.clone();
    let scratch = env
        .scratch_root
        .join(format!("{}{}", SCRATCH_PREFIX, worker));

    std::fs::create_dir_all(&scratch).map_err(|e| PartitionError::Startup {
        identity: identity.clone(),
        source: DriverError::Startup {
            cause: format!("cannot create scratch dir: {}", e),
        },
    })?;
    env.register_scratch(&scratch);
    // Cleanup must also run when the worker panics, not just on early
    // returns, so it lives in a drop guard.
    let _scratch_guard = ScratchGuard {
        env: &env,
        dir: scratch.clone(),
    };

    process_partition(unit, &env, &worker, &scratch).await
}

/// Unregisters and removes the worker's scratch directory on every exit
/// path, panic unwind included.
struct ScratchGuard<'a> {
    env: &'a WorkerEnv,
    dir: PathBuf,
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        self.env.unregister_scratch(&self.dir);
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!(
                    "Failed to remove scratch dir {}: {}",
                    self.dir.display(),
                    e
                );
            }
        }
    }
}

async fn process_partition(
    unit: WorkUnit,
    env: &Arc<WorkerEnv>,
    worker: &WorkerId,
    scratch: &PathBuf,
) -> Result<PartitionReport, PartitionError> {
    let identity = unit.identity.clone();
    let mut records = unit.records;

    let driver = env.factory.create().map_err(|source| PartitionError::Startup {
        identity: identity.clone(),
        source,
    })?;

    log::info!(
        "Starting {} with {} record(s) (worker {})",
        identity,
        records.len(),
        worker
    );

    // Resume: adopt the prefix a previous run already processed.
    let mut start = 0;
    if env.resume {
        match find_resume_prefix(&env.work_dir, &identity, &records) {
            Ok(Some(covered)) => {
                start = covered.len();
                records.splice(..start, covered);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Resume lookup failed for {}: {}", identity, e),
        }
    }

    let checkpoints = CheckpointWriter::new(
        &env.work_dir,
        identity.clone(),
        worker.clone(),
        env.checkpoint_every,
        env.tuning.score_attachments,
    );

    let stats = {
        let mut pipeline = ExtractionPipeline::new(
            &*driver,
            &*env.extractor,
            &*env.scorer,
            scratch,
            &env.tuning,
        );

        for index in start..records.len() {
            pipeline.process_record(&mut records[index]).await;

            let processed = index + 1;
            if checkpoints.is_due(processed) {
                // Checkpoints are advisory: a failed write is a warning,
                // never a lost partition.
                if let Err(e) = checkpoints.write(&records[..processed]) {
                    log::warn!("Checkpoint write failed for {}: {}", identity, e);
                }
                reclaim_scratch(
                    std::slice::from_ref(&env.scratch_root),
                    &env.live_set(),
                );
                log::info!(
                    "{}: {}/{} record(s) (worker {})",
                    identity,
                    processed,
                    records.len(),
                    worker
                );
            }
        }

        pipeline.finish()
    };

    let result_file = partial_path(&env.work_dir, &identity, worker);
    write_records(&result_file, &records, env.tuning.score_attachments).map_err(|source| {
        PartitionError::ResultWrite {
            identity: identity.clone(),
            source,
        }
    })?;
    checkpoints.remove();

    log::info!(
        "✅ {} completed: {} → {}",
        identity,
        stats,
        result_file.display()
    );

    Ok(PartitionReport {
        identity,
        worker: worker.clone(),
        result_file,
        stats,
        resumed: start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{AttachmentRef, PageContent, PageDriver, PageItem};
    use crate::error::ScoreError;
    use crate::model::{GroupKey, Record};
    use crate::output::read_records;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::time::Duration;

    struct StaticDriver;

    #[async_trait]
    impl PageDriver for StaticDriver {
        async fn establish_session(&self, _: &GroupKey) -> Result<(), DriverError> {
            Ok(())
        }

        async fn load_page(&self, url: &str, _: Duration) -> Result<PageContent, DriverError> {
            Ok(PageContent {
                submission_date: Some("01/01/2024".into()),
                items: vec![PageItem {
                    form_name: format!("form for {}", url),
                    attachment: None,
                }],
            })
        }

        async fn trigger_attachment(
            &self,
            _: &AttachmentRef,
            _: &Path,
        ) -> Result<(), DriverError> {
            Ok(())
        }
    }

    struct StaticFactory;
    impl DriverFactory for StaticFactory {
        fn create(&self) -> Result<Box<dyn PageDriver>, DriverError> {
            Ok(Box::new(StaticDriver))
        }
    }

    struct FailingFactory;
    impl DriverFactory for FailingFactory {
        fn create(&self) -> Result<Box<dyn PageDriver>, DriverError> {
            Err(DriverError::Startup {
                cause: "no driver binary".into(),
            })
        }
    }

    struct PanickingDriver;

    #[async_trait]
    impl PageDriver for PanickingDriver {
        async fn establish_session(&self, _: &GroupKey) -> Result<(), DriverError> {
            Ok(())
        }

        async fn load_page(&self, _: &str, _: Duration) -> Result<PageContent, DriverError> {
            panic!("scripted worker crash");
        }

        async fn trigger_attachment(
            &self,
            _: &AttachmentRef,
            _: &Path,
        ) -> Result<(), DriverError> {
            Ok(())
        }
    }

    struct PanickingFactory;
    impl DriverFactory for PanickingFactory {
        fn create(&self) -> Result<Box<dyn PageDriver>, DriverError> {
            Ok(Box::new(PanickingDriver))
        }
    }

    struct NoExtract;
    impl TextExtract for NoExtract {
        fn extract_text(&self, _: &Path) -> Result<String, ScoreError> {
            Err(ScoreError::EmptyText)
        }
    }

    struct NoScore;
    impl crate::score::ReadabilityScore for NoScore {
        fn score(&self, _: &str) -> Result<f64, ScoreError> {
            Err(ScoreError::EmptyText)
        }
    }

    fn env(work: &Path, scratch: &Path, factory: Arc<dyn DriverFactory>) -> Arc<WorkerEnv> {
        Arc::new(WorkerEnv {
            factory,
            extractor: Arc::new(NoExtract),
            scorer: Arc::new(NoScore),
            tuning: PipelineTuning {
                page_wait: Duration::from_millis(50),
                download_wait: Duration::from_millis(50),
                poll_interval: Duration::from_millis(10),
                score_attachments: false,
            },
            work_dir: work.to_path_buf(),
            scratch_root: scratch.to_path_buf(),
            checkpoint_every: 2,
            resume: false,
            live_scratch: Mutex::new(HashSet::new()),
        })
    }

    fn unit(n: usize) -> WorkUnit {
        let records = (0..n)
            .map(|i| Record::new(format!("http://p/{}", i), GroupKey::new("CA"), None))
            .collect();
        WorkUnit::new(PartitionIdentity::new(GroupKey::new("CA"), 0, 1), records)
    }

    #[tokio::test]
    async fn worker_writes_partial_and_cleans_scratch() {
        let work = tempfile::tempdir().unwrap();
        let scratch_root = tempfile::tempdir().unwrap();
        let env = env(work.path(), scratch_root.path(), Arc::new(StaticFactory));

        let report = run_partition(unit(5), Arc::clone(&env)).await.unwrap();

        assert!(report.result_file.exists());
        let persisted = read_records(&report.result_file).unwrap();
        assert_eq!(persisted.len(), 5);
        assert_eq!(persisted[3].fields.form_names, vec!["form for http://p/3"]);

        // Scratch gone, registry empty, checkpoint removed.
        assert_eq!(std::fs::read_dir(scratch_root.path()).unwrap().count(), 0);
        assert!(env.live_scratch.lock().unwrap().is_empty());
        let leftover_checkpoints = std::fs::read_dir(work.path())
            .unwrap()
            .flatten()
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with(crate::constants::CHECKPOINT_PREFIX)
            })
            .count();
        assert_eq!(leftover_checkpoints, 0);
    }

    #[tokio::test]
    async fn startup_failure_is_partition_fatal_and_still_cleans_up() {
        let work = tempfile::tempdir().unwrap();
        let scratch_root = tempfile::tempdir().unwrap();
        let env = env(work.path(), scratch_root.path(), Arc::new(FailingFactory));

        let err = run_partition(unit(3), Arc::clone(&env)).await.unwrap_err();

        assert!(matches!(err, PartitionError::Startup { .. }));
        assert_eq!(std::fs::read_dir(scratch_root.path()).unwrap().count(), 0);
        assert!(env.live_scratch.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn panicking_worker_still_cleans_scratch() {
        let work = tempfile::tempdir().unwrap();
        let scratch_root = tempfile::tempdir().unwrap();
        let env = env(work.path(), scratch_root.path(), Arc::new(PanickingFactory));

        // Spawn so the panic unwinds inside the task instead of failing
        // the test directly.
        let handle = tokio::spawn(run_partition(unit(2), Arc::clone(&env)));
        let join_err = handle.await.unwrap_err();

        assert!(join_err.is_panic());
        assert_eq!(std::fs::read_dir(scratch_root.path()).unwrap().count(), 0);
        assert!(env.live_scratch.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resume_skips_checkpointed_prefix() {
        let work = tempfile::tempdir().unwrap();
        let scratch_root = tempfile::tempdir().unwrap();

        // A previous run checkpointed 3 processed records.
        let unit5 = unit(5);
        let mut covered = unit5.records[..3].to_vec();
        for record in &mut covered {
            record.fields.push_form_name("from previous run");
        }
        CheckpointWriter::new(
            work.path(),
            unit5.identity.clone(),
            WorkerId::fixed("dead"),
            2,
            false,
        )
        .write(&covered)
        .unwrap();

        let env_arc = env(work.path(), scratch_root.path(), Arc::new(StaticFactory));
        let env_arc = Arc::new(WorkerEnv {
            resume: true,
            factory: Arc::clone(&env_arc.factory),
            extractor: Arc::clone(&env_arc.extractor),
            scorer: Arc::clone(&env_arc.scorer),
            tuning: env_arc.tuning.clone(),
            work_dir: env_arc.work_dir.clone(),
            scratch_root: env_arc.scratch_root.clone(),
            checkpoint_every: env_arc.checkpoint_every,
            live_scratch: Mutex::new(HashSet::new()),
        });

        let report = run_partition(unit5, env_arc).await.unwrap();

        assert_eq!(report.resumed, 3);
        let persisted = read_records(&report.result_file).unwrap();
        assert_eq!(persisted.len(), 5);
        // Covered prefix kept verbatim, tail freshly processed.
        assert_eq!(persisted[0].fields.form_names, vec!["from previous run"]);
        assert_eq!(persisted[4].fields.form_names, vec!["form for http://p/4"]);
    }
}
