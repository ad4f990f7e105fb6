//! Durable history log
//!
//! The CSV log is the source of truth for throttling and the daily digest.
//! The sampling job appends to it; the cleanup job prunes it under a lock.

mod lock;
mod retention;
mod store;

pub use lock::{HistoryLock, LockMode};
pub use retention::{PruneReport, RetentionManager, DEFAULT_RETENTION_HOURS};
pub use store::{HistoryStore, StagedRewrite, HEADER};
