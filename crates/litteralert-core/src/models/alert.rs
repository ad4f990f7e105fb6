//! Alert decision models

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entry::LogEntry;

/// Severity of a reading. Ordered: `None < Advisory < Urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertTier {
    /// Nothing to report
    None,
    /// Worth attention soon
    Advisory,
    /// Needs attention now
    Urgent,
}

impl fmt::Display for AlertTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Advisory => "advisory",
            Self::Urgent => "urgent",
        };
        f.pad(s)
    }
}

/// Why an alert-worthy reading was not sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressedReason {
    /// Inside the configured quiet hours
    QuietHours,
    /// A same-kind alert of this tier or higher was sent too recently
    Cooldown,
}

impl fmt::Display for SuppressedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::QuietHours => "quiet_hours",
            Self::Cooldown => "cooldown",
        };
        f.pad(s)
    }
}

/// Outcome of evaluating one reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Tier the reading classified into
    pub tier: AlertTier,

    /// Set when an alert-worthy reading is held back
    pub suppressed_reason: Option<SuppressedReason>,

    /// Entry to append to the history log
    pub entry: LogEntry,
}

impl Decision {
    /// Whether the caller should dispatch a notification
    pub fn should_send(&self) -> bool {
        self.entry.sent
    }
}
