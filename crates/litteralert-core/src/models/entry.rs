//! History log entry model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};

/// What a log entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Waste tray fullness reading
    Container,
    /// Litter sand level reading
    Litter,
    /// Daily digest
    Morning,
}

impl EntryKind {
    /// Name as written in the `type` column
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Litter => "litter",
            Self::Morning => "morning",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "container" => Ok(Self::Container),
            "litter" => Ok(Self::Litter),
            "morning" => Ok(Self::Morning),
            other => Err(format!("unknown entry type '{other}'")),
        }
    }
}

/// One row of the history log. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the reading was taken, with the local UTC offset
    pub timestamp: DateTime<FixedOffset>,

    /// Entry kind
    pub kind: EntryKind,

    /// Percentage; meaning depends on `kind`
    pub level: f64,

    /// Whether a notification was dispatched for this entry
    pub sent: bool,
}

impl LogEntry {
    /// Create a new entry
    pub fn new(timestamp: DateTime<FixedOffset>, kind: EntryKind, level: f64, sent: bool) -> Self {
        Self {
            timestamp,
            kind,
            level,
            sent,
        }
    }

    /// Timestamp as written to the log (`2024-05-01T09:30:00.000000-05:00`)
    pub fn timestamp_field(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, false)
    }

    /// Level as written to the log, one decimal
    pub fn level_field(&self) -> String {
        format!("{:.1}", self.level)
    }

    /// `True` / `False` literal as written to the log
    pub fn sent_field(&self) -> &'static str {
        if self.sent {
            "True"
        } else {
            "False"
        }
    }
}
