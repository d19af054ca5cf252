// src/constants.rs
//! Domain constants that define the operational boundaries of the harvest.
//!
//! Each constant is named for the domain concept it constrains. Reading
//! them should tell you the story of how a run operates: how work is
//! chunked, how long waits are bounded, how scratch space is named.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Partitioning boundaries
// ---------------------------------------------------------------------------

/// Default number of records per partition when no chunk size is given.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default cap on concurrently running workers.
///
/// Each worker holds one page-driver context, which is the memory-heavy
/// resource. The effective pool size is
/// `min(available_parallelism, cap, partition_count)`.
pub const DEFAULT_WORKER_CAP: usize = 7;

/// How many processed records between checkpoint writes.
pub const DEFAULT_CHECKPOINT_EVERY: usize = 200;

// ---------------------------------------------------------------------------
// Wait boundaries
// ---------------------------------------------------------------------------

/// Upper bound on waiting for a page's content markers to appear.
/// The `_SECS` form is the CLI-facing default.
pub const DEFAULT_PAGE_WAIT_SECS: u64 = 20;
pub const DEFAULT_PAGE_WAIT: Duration = Duration::from_secs(DEFAULT_PAGE_WAIT_SECS);

/// Upper bound on waiting for a session's consent flow controls.
pub const SESSION_FLOW_WAIT: Duration = Duration::from_secs(10);

/// Upper bound on waiting for a triggered attachment download to land.
pub const DEFAULT_DOWNLOAD_WAIT_SECS: u64 = 15;
pub const DEFAULT_DOWNLOAD_WAIT: Duration = Duration::from_secs(DEFAULT_DOWNLOAD_WAIT_SECS);

/// Interval between scratch-directory polls while waiting for a download.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);

/// Pause before the single retry of a failed artifact deletion.
pub const DELETE_RETRY_DELAY: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Filesystem naming
// ---------------------------------------------------------------------------

/// Prefix of every per-worker scratch directory. The reclaimer only ever
/// deletes directories carrying this prefix.
pub const SCRATCH_PREFIX: &str = "formharvest_scratch_";

/// Prefix of per-partition result files in the work directory.
pub const PARTIAL_PREFIX: &str = "partial_";

/// Prefix of per-partition checkpoint files in the work directory.
pub const CHECKPOINT_PREFIX: &str = "checkpoint_";

/// File suffix an artifact must carry to count as a download candidate.
pub const ARTIFACT_SUFFIX: &str = ".pdf";

/// Sibling-marker suffix that flags a download as still in progress.
pub const IN_PROGRESS_SUFFIX: &str = ".part";

// ---------------------------------------------------------------------------
// Upstream site
// ---------------------------------------------------------------------------

/// Per-state entry point that hosts the consent flow for a group key.
pub const AUTH_URL_BASE: &str = "https://filingaccess.serff.com/sfa/home/";
