// tests/end_to_end_pipeline.rs
//! Full pipeline over a scripted driver: plan, dispatch, merge.

use async_trait::async_trait;
use formharvest::aggregate::merge_results;
use formharvest::dispatch::dispatch_all;
use formharvest::driver::{AttachmentRef, DriverFactory, PageContent, PageDriver, PageItem};
use formharvest::error::{DriverError, HarvestError, ScoreError};
use formharvest::extract::PipelineTuning;
use formharvest::model::{GroupKey, PartitionIdentity, Record};
use formharvest::output::read_records;
use formharvest::partition::{build_partitions, ChunkPolicy};
use formharvest::score::{ReadabilityScore, TextExtract};
use formharvest::worker::WorkerEnv;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Serves one deterministic item per page; every other page also
/// carries an attachment whose artifact is written on trigger.
struct SyntheticSite;

#[async_trait]
impl PageDriver for SyntheticSite {
    async fn establish_session(&self, _: &GroupKey) -> Result<(), DriverError> {
        Ok(())
    }

    async fn load_page(&self, url: &str, _: Duration) -> Result<PageContent, DriverError> {
        let page_no: usize = url.rsplit('/').next().unwrap().parse().unwrap();
        let attachment = (page_no % 2 == 0).then(|| AttachmentRef {
            url: format!("{}/attachment", url),
        });

        Ok(PageContent {
            submission_date: Some("06/01/2024".into()),
            items: vec![PageItem {
                form_name: format!("Form {}", page_no),
                attachment,
            }],
        })
    }

    async fn trigger_attachment(
        &self,
        attachment: &AttachmentRef,
        download_dir: &Path,
    ) -> Result<(), DriverError> {
        let name = attachment.url.replace(['/', ':'], "_");
        std::fs::write(download_dir.join(format!("{}.pdf", name)), b"ten bytes!").unwrap();
        Ok(())
    }
}

struct SyntheticFactory;
impl DriverFactory for SyntheticFactory {
    fn create(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        Ok(Box::new(SyntheticSite))
    }
}

struct RawBytesExtractor;
impl TextExtract for RawBytesExtractor {
    fn extract_text(&self, file: &Path) -> Result<String, ScoreError> {
        std::fs::read_to_string(file).map_err(|source| ScoreError::FileRead {
            path: file.to_path_buf(),
            source,
        })
    }
}

struct ByteCountScorer;
impl ReadabilityScore for ByteCountScorer {
    fn score(&self, text: &str) -> Result<f64, ScoreError> {
        Ok(text.len() as f64)
    }
}

fn env(work: &Path, scratch: &Path) -> Arc<WorkerEnv> {
    Arc::new(WorkerEnv {
        factory: Arc::new(SyntheticFactory),
        extractor: Arc::new(RawBytesExtractor),
        scorer: Arc::new(ByteCountScorer),
        tuning: PipelineTuning {
            page_wait: Duration::from_millis(200),
            download_wait: Duration::from_millis(500),
            poll_interval: Duration::from_millis(10),
            score_attachments: true,
        },
        work_dir: work.to_path_buf(),
        scratch_root: scratch.to_path_buf(),
        checkpoint_every: 2,
        resume: false,
        live_scratch: Mutex::new(HashSet::new()),
    })
}

fn input_records() -> Vec<Record> {
    let mut input = Vec::new();
    for i in 0..5 {
        input.push(Record::new(
            format!("http://site/ca/{}", i),
            GroupKey::new("California"),
            Some(format!("CA-{}", i)),
        ));
    }
    for i in 0..3 {
        input.push(Record::new(
            format!("http://site/tx/{}", i),
            GroupKey::new("Texas"),
            None,
        ));
    }
    input
}

#[tokio::test]
async fn pipeline_produces_one_merged_csv() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let output = work.path().join("results.csv");

    let units = build_partitions(input_records(), ChunkPolicy::Fixed(2));
    // California: 3 chunks, Texas: 2 chunks.
    assert_eq!(units.len(), 5);
    let expected: Vec<PartitionIdentity> = units.iter().map(|u| u.identity.clone()).collect();

    let report = dispatch_all(units, env(work.path(), scratch.path()), 3).await;
    assert!(report.all_succeeded(), "failures: {:?}", report.failed);

    let merged = merge_results(work.path(), &expected, &output, true).unwrap();
    assert!(merged.is_complete());
    assert_eq!(merged.rows, 8);

    let rows = read_records(&output).unwrap();
    assert_eq!(rows.len(), 8);

    // Every record kept its source fields and gained extracted ones.
    let urls: HashSet<&str> = rows.iter().map(|r| r.page_url.as_str()).collect();
    assert_eq!(urls.len(), 8);
    for row in &rows {
        assert_eq!(row.fields.form_names.len(), 1);
        assert_eq!(row.fields.submission_date.as_deref(), Some("06/01/2024"));

        // Even-numbered pages carry one scored attachment (10 bytes).
        let page_no: usize = row.page_url.rsplit('/').next().unwrap().parse().unwrap();
        if page_no % 2 == 0 {
            assert_eq!(row.fields.flesch_scores, vec![Some(10.0)]);
        } else {
            assert!(row.fields.flesch_scores.is_empty());
        }
    }

    // No partials, checkpoints or scratch dirs survive a clean run.
    let leftovers = std::fs::read_dir(work.path())
        .unwrap()
        .flatten()
        .filter(|e| e.path() != output)
        .count();
    assert_eq!(leftovers, 0);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn lost_partition_yields_incomplete_merge_not_silence() {
    let work = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let output = work.path().join("results.csv");

    let units = build_partitions(input_records(), ChunkPolicy::Fixed(2));
    let expected: Vec<PartitionIdentity> = units.iter().map(|u| u.identity.clone()).collect();

    let report = dispatch_all(units, env(work.path(), scratch.path()), 2).await;
    assert!(report.all_succeeded());

    // Simulate a partition whose result never made it to disk.
    let lost = &report.completed[0];
    std::fs::remove_file(&lost.result_file).unwrap();

    let merged = merge_results(work.path(), &expected, &output, true).unwrap();

    assert!(!merged.is_complete());
    assert_eq!(merged.missing, vec![lost.identity.to_string()]);
    assert_eq!(merged.rows, 8 - lost.stats.records_processed);
    assert_eq!(read_records(&output).unwrap().len(), merged.rows);
}

#[tokio::test]
async fn nothing_on_disk_is_a_hard_error() {
    let work = tempfile::tempdir().unwrap();
    let output = work.path().join("results.csv");
    let expected = vec![PartitionIdentity::new(GroupKey::new("California"), 0, 1)];

    let err = merge_results(work.path(), &expected, &output, true).unwrap_err();
    assert!(matches!(err, HarvestError::NoResults { expected: 1 }));
}
