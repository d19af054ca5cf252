// src/extract.rs
//! Per-record extraction: session, page content, items, attachments,
//! scores.
//!
//! Nothing in here propagates an error past the record boundary. A page
//! that never renders skips the record; an item that fails to score
//! gets a `null` score; an attachment that never arrives gets no score
//! entry at all. Previously extracted fields always survive later
//! failures within the same record.

use crate::artifact::{fetch_and_wait, remove_artifact};
use crate::driver::{AttachmentRef, PageDriver, PageItem};
use crate::error::{DriverError, SkipReason};
use crate::model::Record;
use crate::score::{ReadabilityScore, TextExtract};
use crate::session::SessionManager;
use std::path::Path;
use std::time::Duration;

/// Wait bounds and mode switches for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineTuning {
    pub page_wait: Duration,
    pub download_wait: Duration,
    pub poll_interval: Duration,
    /// When false the pipeline runs metadata-only: no attachment
    /// fetches, no score column.
    pub score_attachments: bool,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            page_wait: crate::constants::DEFAULT_PAGE_WAIT,
            download_wait: crate::constants::DEFAULT_DOWNLOAD_WAIT,
            poll_interval: crate::constants::DEFAULT_POLL_INTERVAL,
            score_attachments: true,
        }
    }
}

/// Counters accumulated while a worker runs its partition.
#[derive(Debug, Clone, Default)]
pub struct PartitionStats {
    pub records_processed: usize,
    pub records_skipped: usize,
    pub items_extracted: usize,
    pub scores_computed: usize,
    pub null_scores: usize,
    pub attachment_timeouts: usize,
    pub degraded_sessions: usize,
}

impl std::fmt::Display for PartitionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} records ({} skipped), {} items, {} scores ({} null, {} downloads timed out)",
            self.records_processed,
            self.records_skipped,
            self.items_extracted,
            self.scores_computed + self.null_scores,
            self.null_scores,
            self.attachment_timeouts
        )
    }
}

/// What happened to one attachment attempt.
enum AttachmentOutcome {
    /// Nothing landed — the score sequence receives no entry.
    NoArtifact,
    /// An artifact was consumed; `None` means scoring failed.
    Scored(Option<f64>),
}

/// Runs the per-record extraction for one worker's partition.
pub struct ExtractionPipeline<'a> {
    driver: &'a dyn PageDriver,
    sessions: SessionManager<'a>,
    extractor: &'a dyn TextExtract,
    scorer: &'a dyn ReadabilityScore,
    scratch_dir: &'a Path,
    tuning: &'a PipelineTuning,
    stats: PartitionStats,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(
        driver: &'a dyn PageDriver,
        extractor: &'a dyn TextExtract,
        scorer: &'a dyn ReadabilityScore,
        scratch_dir: &'a Path,
        tuning: &'a PipelineTuning,
    ) -> Self {
        Self {
            driver,
            sessions: SessionManager::new(driver),
            extractor,
            scorer,
            scratch_dir,
            tuning,
            stats: PartitionStats::default(),
        }
    }

    /// Processes one record in place. Never fails; failures become
    /// skips, null scores or absent entries, logged where they occur.
    pub async fn process_record(&mut self, record: &mut Record) {
        self.sessions.ensure_session(&record.state).await;

        let content = match self
            .driver
            .load_page(&record.page_url, self.tuning.page_wait)
            .await
        {
            Ok(content) => content,
            Err(DriverError::ContentTimeout { url }) => {
                self.skip_record(SkipReason::PageContentTimeout { url });
                return;
            }
            Err(e) => {
                self.skip_record(SkipReason::PageUnavailable {
                    url: record.page_url.clone(),
                    cause: e.to_string(),
                });
                return;
            }
        };

        record.fields.set_submission_date(content.submission_date);

        for item in content.items {
            self.process_item(record, item).await;
        }
        self.stats.records_processed += 1;
    }

    /// Releases the session and returns the run's counters.
    pub fn finish(mut self) -> PartitionStats {
        self.sessions.release();
        self.stats.degraded_sessions = self.sessions.degraded_count();
        self.stats
    }

    /// One item: the name lands first so a later attachment failure can
    /// never lose it.
    async fn process_item(&mut self, record: &mut Record, item: PageItem) {
        record.fields.push_form_name(&item.form_name);
        self.stats.items_extracted += 1;

        if !self.tuning.score_attachments {
            return;
        }
        let Some(attachment) = item.attachment else {
            return;
        };

        match self.score_attachment(&item.form_name, &attachment).await {
            AttachmentOutcome::NoArtifact => {
                self.stats.attachment_timeouts += 1;
            }
            AttachmentOutcome::Scored(score) => {
                match score {
                    Some(_) => self.stats.scores_computed += 1,
                    None => self.stats.null_scores += 1,
                }
                record.fields.push_score(score);
            }
        }
    }

    /// Fetches, detects, extracts and scores one attachment. The
    /// artifact is deleted before this returns, whatever happened.
    async fn score_attachment(
        &mut self,
        form_name: &str,
        attachment: &AttachmentRef,
    ) -> AttachmentOutcome {
        let triggered = fetch_and_wait(
            self.scratch_dir,
            || self.driver.trigger_attachment(attachment, self.scratch_dir),
            self.tuning.download_wait,
            self.tuning.poll_interval,
        )
        .await;

        let file = match triggered {
            Ok(Some(file)) => file,
            Ok(None) => {
                log::debug!(
                    "Skip: {}",
                    SkipReason::AttachmentTimeout {
                        form_name: form_name.to_string()
                    }
                );
                return AttachmentOutcome::NoArtifact;
            }
            Err(e) => {
                // The trigger failed outright: a discovered attachment
                // with no consumable artifact scores null.
                log::debug!(
                    "Skip: {}",
                    SkipReason::AttachmentTrigger {
                        form_name: form_name.to_string(),
                        cause: e.to_string()
                    }
                );
                return AttachmentOutcome::Scored(None);
            }
        };

        let score = match self.extractor.extract_text(&file) {
            Ok(text) => match self.scorer.score(&text) {
                Ok(score) => Some(score),
                Err(e) => {
                    log::debug!("Skip: {}", SkipReason::Scoring { cause: e.to_string() });
                    None
                }
            },
            Err(e) => {
                log::debug!(
                    "Skip: {}",
                    SkipReason::TextExtraction {
                        path: file.clone(),
                        cause: e.to_string()
                    }
                );
                None
            }
        };

        remove_artifact(&file).await;
        AttachmentOutcome::Scored(score)
    }

    fn skip_record(&mut self, reason: SkipReason) {
        log::debug!("Skipping record: {}", reason);
        self.stats.records_skipped += 1;
    }
}
