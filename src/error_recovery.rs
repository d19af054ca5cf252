// src/error_recovery.rs
//! Bounded-wait primitives: poll-until-predicate and single-retry deletion.

use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

/// Polls an async probe at a fixed interval until it yields a value or the
/// timeout elapses.
///
/// The probe runs immediately once, so a condition that already holds is
/// observed without sleeping. `None` means the timeout elapsed — callers
/// treat that as a recoverable absence, not an error.
pub async fn poll_until<T, F, Fut>(
    mut probe: F,
    timeout: Duration,
    interval: Duration,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Removes a file, retrying exactly once after `retry_delay` if the first
/// attempt fails (the file may still be locked by the producer).
///
/// A second failure is logged and swallowed — a leftover artifact must
/// never abort the partition.
pub async fn remove_with_retry(path: &Path, retry_delay: Duration) {
    if !path.exists() {
        return;
    }
    if let Err(first) = std::fs::remove_file(path) {
        log::warn!(
            "Failed to delete {} ({}), retrying once",
            path.display(),
            first
        );
        tokio::time::sleep(retry_delay).await;
        if path.exists() {
            match std::fs::remove_file(path) {
                Ok(()) => log::info!("Deleted on retry: {}", path.display()),
                Err(second) => log::error!(
                    "Failed to delete {} on retry: {}",
                    path.display(),
                    second
                ),
            }
        }
    }
}
