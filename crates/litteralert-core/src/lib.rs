//! # litteralert
//!
//! SMS alerts and an audit log for a self-cleaning litter box.
//!
//! litteralert is run by cron. Each `check` samples the robot's waste tray
//! and litter level, decides whether anyone should be texted, and appends
//! the readings to a CSV history log. A separate `cleanup` run prunes that
//! log to a rolling window and keeps an eye on the SMS balance.
//!
//! ## Architecture
//!
//! - **History**: append-only CSV log, atomic pruning under a file lock
//! - **Alerting**: tier classification, quiet hours, cooldowns, daily digest
//! - **Notifier**: SMS fan-out through a gateway (Textbelt)
//! - **Device**: robot snapshot source (HTTP endpoint or JSON file)
//!
//! ## Quick Start
//!
//! ```bash
//! # Every 15 minutes
//! litteralert check
//!
//! # Hourly
//! litteralert cleanup
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod alerting;
pub mod config;
pub mod device;
pub mod error;
pub mod history;
pub mod jobs;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertEngine, DigestAggregator, NotificationSender, SmsGateway};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::history::{HistoryStore, LockMode, RetentionManager};
    pub use crate::models::*;
}
