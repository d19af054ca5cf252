// tests/dispatch_concurrency.rs
//! Dispatcher behavior under a bounded pool: the concurrency cap holds
//! and one failing partition never takes its siblings down.

use async_trait::async_trait;
use formharvest::dispatch::dispatch_all;
use formharvest::driver::{AttachmentRef, DriverFactory, PageContent, PageDriver, PageItem};
use formharvest::error::{DriverError, PartitionError, ScoreError};
use formharvest::extract::PipelineTuning;
use formharvest::model::{GroupKey, Record};
use formharvest::partition::{build_partitions, ChunkPolicy};
use formharvest::score::{ReadabilityScore, TextExtract};
use formharvest::worker::WorkerEnv;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tracks how many page loads run at once across all workers.
#[derive(Default)]
struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

struct GaugedDriver {
    gauge: Arc<ConcurrencyGauge>,
}

#[async_trait]
impl PageDriver for GaugedDriver {
    async fn establish_session(&self, _: &GroupKey) -> Result<(), DriverError> {
        Ok(())
    }

    async fn load_page(&self, url: &str, _: Duration) -> Result<PageContent, DriverError> {
        self.gauge.enter();
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.gauge.exit();
        Ok(PageContent {
            submission_date: None,
            items: vec![PageItem {
                form_name: format!("form {}", url),
                attachment: None,
            }],
        })
    }

    async fn trigger_attachment(&self, _: &AttachmentRef, _: &Path) -> Result<(), DriverError> {
        Ok(())
    }
}

struct GaugedFactory {
    gauge: Arc<ConcurrencyGauge>,
    /// Zero-based creation indices that fail to start.
    poisoned: Vec<usize>,
    created: AtomicUsize,
}

impl DriverFactory for GaugedFactory {
    fn create(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        // Poisoning is positional: the partitions are ordered
        // largest-first, so callers arrange sizes to pick the victim.
        let nth = self.created.fetch_add(1, Ordering::SeqCst);
        if self.poisoned.contains(&nth) {
            return Err(DriverError::Startup {
                cause: "scripted startup failure".into(),
            });
        }
        Ok(Box::new(GaugedDriver {
            gauge: Arc::clone(&self.gauge),
        }))
    }
}

struct NoExtract;
impl TextExtract for NoExtract {
    fn extract_text(&self, _: &Path) -> Result<String, ScoreError> {
        Err(ScoreError::EmptyText)
    }
}

struct NoScore;
impl ReadabilityScore for NoScore {
    fn score(&self, _: &str) -> Result<f64, ScoreError> {
        Err(ScoreError::EmptyText)
    }
}

fn records(state: &str, n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| Record::new(format!("http://{}/f/{}", state, i), GroupKey::new(state), None))
        .collect()
}

fn worker_env(
    factory: Arc<dyn DriverFactory>,
    work_dir: &Path,
    scratch_root: &Path,
) -> Arc<WorkerEnv> {
    Arc::new(WorkerEnv {
        factory,
        extractor: Arc::new(NoExtract),
        scorer: Arc::new(NoScore),
        tuning: PipelineTuning {
            page_wait: Duration::from_millis(100),
            download_wait: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            score_attachments: false,
        },
        work_dir: work_dir.to_path_buf(),
        scratch_root: scratch_root.to_path_buf(),
        checkpoint_every: 0,
        resume: false,
        live_scratch: Mutex::new(HashSet::new()),
    })
}

#[tokio::test]
async fn pool_never_exceeds_the_worker_cap() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let gauge = Arc::new(ConcurrencyGauge::default());
    let factory = Arc::new(GaugedFactory {
        gauge: Arc::clone(&gauge),
        poisoned: Vec::new(),
        created: AtomicUsize::new(0),
    });

    // Five single-state partitions of four records each, three workers.
    let mut input = Vec::new();
    for state in ["AK", "AL", "AR", "AZ", "CA"] {
        input.extend(records(state, 4));
    }
    let units = build_partitions(input, ChunkPolicy::Fixed(4));
    assert_eq!(units.len(), 5);

    let env = worker_env(factory, work.path(), scratch.path());
    let report = dispatch_all(units, env, 3).await;

    assert!(report.all_succeeded());
    assert_eq!(report.completed.len(), 5);
    // Each page load sleeps, so the three admitted workers overlap; the
    // fourth and fifth can only have run after a slot freed.
    let peak = gauge.peak.load(Ordering::SeqCst);
    assert_eq!(peak, 3, "pool should saturate the cap and never exceed it");
}

#[tokio::test]
async fn failed_partition_does_not_cancel_siblings() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let factory = Arc::new(GaugedFactory {
        gauge: Arc::new(ConcurrencyGauge::default()),
        poisoned: vec![0],
        created: AtomicUsize::new(0),
    });

    // One worker, so partitions start strictly in order and the first
    // driver creation (the poisoned one) belongs to the first partition.
    let mut input = records("CA", 4);
    input.extend(records("TX", 2));
    let units = build_partitions(input, ChunkPolicy::Fixed(10));

    let env = worker_env(factory, work.path(), scratch.path());
    let report = dispatch_all(units, env, 1).await;

    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0], PartitionError::Startup { .. }));

    // The surviving partition persisted its result.
    assert_eq!(report.completed[0].identity.group_key, GroupKey::new("TX"));
    assert!(report.completed[0].result_file.exists());
}
