// src/session.rs
//! Group-key-scoped session lifecycle.
//!
//! A session is an explicit value owned by one worker, never shared:
//! two workers on the same group key each hold their own. The manager
//! reuses the current session while the group key matches and replaces
//! it when it changes. Establishment failure degrades to an
//! unauthenticated session rather than aborting the partition — the
//! upstream pages are best-effort readable either way, and a blocked
//! consent flow must not cost a whole partition. Degraded sessions are
//! surfaced as warnings and counted.

use crate::driver::PageDriver;
use crate::model::GroupKey;
use chrono::{DateTime, Utc};

/// An established (or degraded) authenticated context for one group key.
#[derive(Debug, Clone)]
pub struct Session {
    pub group_key: GroupKey,
    /// False when the consent flow failed and we continue fail-open.
    pub authenticated: bool,
    pub established_at: DateTime<Utc>,
}

/// Owns the worker's current session and re-establishes it on group-key
/// change.
pub struct SessionManager<'a> {
    driver: &'a dyn PageDriver,
    current: Option<Session>,
    /// How many establishment attempts ended degraded.
    degraded_count: usize,
}

impl<'a> SessionManager<'a> {
    pub fn new(driver: &'a dyn PageDriver) -> Self {
        Self {
            driver,
            current: None,
            degraded_count: 0,
        }
    }

    /// Returns a session for `group_key`, reusing the current one when
    /// the key matches and establishing a replacement when it does not.
    pub async fn ensure_session(&mut self, group_key: &GroupKey) -> &Session {
        let needs_new = match &self.current {
            Some(session) => session.group_key != *group_key,
            None => true,
        };

        if needs_new {
            let authenticated = match self.driver.establish_session(group_key).await {
                Ok(()) => {
                    log::info!("Session established for '{}'", group_key);
                    true
                }
                Err(e) => {
                    // Fail-open: continue unauthenticated, loudly.
                    self.degraded_count += 1;
                    log::warn!(
                        "Session flow failed for '{}', continuing unauthenticated: {}",
                        group_key,
                        e
                    );
                    false
                }
            };

            self.current = Some(Session {
                group_key: group_key.clone(),
                authenticated,
                established_at: Utc::now(),
            });
        }

        self.current.as_ref().expect("session was just ensured")
    }

    pub fn degraded_count(&self) -> usize {
        self.degraded_count
    }

    /// Drops the current session. Called on every worker exit path.
    pub fn release(&mut self) {
        if let Some(session) = self.current.take() {
            log::debug!("Released session for '{}'", session.group_key);
        }
    }
}
