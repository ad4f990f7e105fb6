//! Rolling-window pruning of the history log

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;

use super::lock::{HistoryLock, LockMode};
use super::store::{HistoryStore, StagedRewrite};

/// Default retention window
pub const DEFAULT_RETENTION_HOURS: u32 = 48;

/// Outcome of a prune
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Entries still in the log
    pub kept: usize,
    /// Entries older than the window that were dropped
    pub removed: usize,
}

/// Trims the history log under the exclusive lock.
///
/// Appends do not take the lock. A row appended after the prune has read
/// the log but before the rename lands in the replaced file and is lost.
/// At most one cycle's rows can go this way; making appends lock as well
/// would let a slow prune block sampling.
#[derive(Debug, Clone)]
pub struct RetentionManager {
    store: HistoryStore,
    mode: LockMode,
}

impl RetentionManager {
    /// Create a manager for `store` using the given lock policy
    pub fn new(store: HistoryStore, mode: LockMode) -> Self {
        Self { store, mode }
    }

    /// Drop entries older than `retention_hours` before `now`
    pub fn prune<Tz: TimeZone>(&self, now: &DateTime<Tz>, retention_hours: u32) -> Result<PruneReport> {
        let lock = HistoryLock::acquire(&self.store.lock_path(), self.mode)?;

        let Some((staged, report)) = self.stage_prune(now, retention_hours)? else {
            debug!(path = %self.store.path().display(), "No history log to prune");
            return Ok(PruneReport::default());
        };
        staged.commit()?;
        drop(lock);

        info!(
            path = %self.store.path().display(),
            kept = report.kept,
            removed = report.removed,
            retention_hours,
            "Pruned history log"
        );
        Ok(report)
    }

    /// Read and filter the log into a staged rewrite. Caller holds the lock.
    fn stage_prune<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        retention_hours: u32,
    ) -> Result<Option<(StagedRewrite, PruneReport)>> {
        if !self.store.path().exists() {
            return Ok(None);
        }

        let cutoff = now.with_timezone(&Utc) - Duration::hours(i64::from(retention_hours));
        let rows = self.store.read_rows()?;
        let total = rows.len();

        let kept: Vec<_> = rows
            .iter()
            .filter(|row| row.entry.timestamp.with_timezone(&Utc) >= cutoff)
            .map(|row| &row.record)
            .collect();
        let report = PruneReport {
            kept: kept.len(),
            removed: total - kept.len(),
        };

        let staged = self.store.stage(kept)?;
        Ok(Some((staged, report)))
    }
}
