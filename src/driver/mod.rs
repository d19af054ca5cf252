// src/driver/mod.rs
//! Page-driver capability traits — the seam between the harvesting core
//! and the site-specific navigation/selector logic.
//!
//! The core never touches HTML or HTTP directly; it consumes pages as
//! [`PageContent`] through [`PageDriver`]. A worker owns exactly one
//! driver for the lifetime of its partition, created through
//! [`DriverFactory`] so a factory failure is partition-fatal without
//! touching sibling workers.

pub mod serff;

use crate::error::DriverError;
use crate::model::GroupKey;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use serff::{SerffDriver, SerffDriverFactory};

/// A download trigger discovered on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRef {
    /// Resolved URL the trigger points at.
    pub url: String,
}

/// One item discovered on a page: a name and, when the item exposes a
/// download trigger, the attachment behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct PageItem {
    pub form_name: String,
    pub attachment: Option<AttachmentRef>,
}

/// Structured content extracted from one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub submission_date: Option<String>,
    pub items: Vec<PageItem>,
}

/// Site navigation and extraction, owned by exactly one worker.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Runs the consent/acceptance flow for a group key, establishing an
    /// authenticated context. Errors here are degraded-but-recoverable:
    /// the session manager continues unauthenticated.
    async fn establish_session(&self, group_key: &GroupKey) -> Result<(), DriverError>;

    /// Fetches a page and waits up to `wait` for its expected content
    /// markers. `ContentTimeout` means the record is skipped, not failed.
    async fn load_page(&self, url: &str, wait: Duration) -> Result<PageContent, DriverError>;

    /// Starts the side-effecting download of an attachment into
    /// `download_dir`. Returns once the download is *triggered*; arrival
    /// is detected separately by polling the directory.
    async fn trigger_attachment(
        &self,
        attachment: &AttachmentRef,
        download_dir: &Path,
    ) -> Result<(), DriverError>;
}

/// Configuration handed to driver construction.
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    /// `BROWSER_BINARY` override for a native-automation backend.
    pub browser_binary: Option<PathBuf>,
    /// `DRIVER_PATH` override for a pre-resolved driver binary.
    pub driver_path: Option<PathBuf>,
}

/// Creates one isolated driver per worker.
pub trait DriverFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn PageDriver>, DriverError>;
}
