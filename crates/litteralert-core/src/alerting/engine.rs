//! Alert decision engine
//!
//! A decision is a pure function of the reading, the current time, the
//! configuration and a snapshot of the history log. Nothing is cached
//! between invocations; the last alert time per kind and tier is derived
//! from the snapshot on every call.

use chrono::{DateTime, FixedOffset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::time::Duration;
use tracing::debug;

use crate::config::{Config, ThresholdConfig};
use crate::error::Result;
use crate::models::{AlertTier, Decision, EntryKind, LogEntry, Reading, SuppressedReason};

/// Classify a level of the given kind against the thresholds.
///
/// Tray levels alert upwards (`>=`), litter levels downwards (`<=`). Ties
/// count toward the tier, and urgent is checked before advisory.
pub fn classify(kind: EntryKind, level: f64, thresholds: &ThresholdConfig) -> AlertTier {
    match kind {
        EntryKind::Container if level >= thresholds.tray_urgent => AlertTier::Urgent,
        EntryKind::Container if level >= thresholds.tray_advisory => AlertTier::Advisory,
        EntryKind::Litter if level <= thresholds.litter_urgent => AlertTier::Urgent,
        EntryKind::Litter if level <= thresholds.litter_advisory => AlertTier::Advisory,
        _ => AlertTier::None,
    }
}

/// Decides whether a reading is sent or suppressed
#[derive(Debug, Clone)]
pub struct AlertEngine<'a> {
    config: &'a Config,
    timezone: Tz,
}

impl<'a> AlertEngine<'a> {
    /// Create an engine for one invocation's configuration
    pub fn new(config: &'a Config) -> Result<Self> {
        Ok(Self {
            config,
            timezone: config.timezone()?,
        })
    }

    /// Tier of a reading under the configured thresholds
    pub fn classify(&self, reading: &Reading) -> AlertTier {
        classify(reading.kind, reading.level, &self.config.thresholds)
    }

    /// Evaluate one reading against the history snapshot
    pub fn decide<T: TimeZone>(
        &self,
        reading: &Reading,
        now: &DateTime<T>,
        history: &[LogEntry],
    ) -> Decision {
        let local = now.with_timezone(&self.timezone);
        let tier = self.classify(reading);

        let suppressed_reason = if tier == AlertTier::None {
            None
        } else if self.config.test {
            debug!(kind = %reading.kind, %tier, "Test mode, skipping quiet hours and cooldown");
            None
        } else if self.in_quiet_hours(&local) {
            Some(SuppressedReason::QuietHours)
        } else if self.in_cooldown(reading.kind, tier, &local, history) {
            Some(SuppressedReason::Cooldown)
        } else {
            None
        };

        let sent = tier != AlertTier::None && suppressed_reason.is_none();

        debug!(
            kind = %reading.kind,
            level = reading.level,
            %tier,
            sent,
            suppressed = ?suppressed_reason,
            "Evaluated reading"
        );

        Decision {
            tier,
            suppressed_reason,
            entry: LogEntry::new(local.fixed_offset(), reading.kind, reading.level, sent),
        }
    }

    /// Whether `now` falls inside the quiet window, in the configured timezone.
    ///
    /// A window with `start_hour > end_hour` wraps midnight.
    pub fn in_quiet_hours<T: TimeZone>(&self, now: &DateTime<T>) -> bool {
        self.config
            .quiet_hours
            .contains(now.with_timezone(&self.timezone).hour())
    }

    /// Cooldown applying to alerts of `tier`
    pub fn cooldown(&self, tier: AlertTier) -> Option<Duration> {
        match tier {
            AlertTier::Urgent => Some(self.config.cooldown.urgent),
            AlertTier::Advisory => Some(self.config.cooldown.advisory),
            AlertTier::None => None,
        }
    }

    /// Time of the most recent sent alert of `kind` at `tier` or higher.
    ///
    /// The tier of past entries is re-derived from their stored level, so an
    /// advisory alert never counts against a later urgent one.
    pub fn cooldown_state(
        &self,
        kind: EntryKind,
        tier: AlertTier,
        history: &[LogEntry],
    ) -> Option<DateTime<FixedOffset>> {
        history
            .iter()
            .rev()
            .find(|entry| {
                entry.sent
                    && entry.kind == kind
                    && classify(entry.kind, entry.level, &self.config.thresholds) >= tier
            })
            .map(|entry| entry.timestamp)
    }

    fn in_cooldown<T: TimeZone>(
        &self,
        kind: EntryKind,
        tier: AlertTier,
        now: &DateTime<T>,
        history: &[LogEntry],
    ) -> bool {
        let (Some(window), Some(last_sent)) =
            (self.cooldown(tier), self.cooldown_state(kind, tier, history))
        else {
            return false;
        };

        // A last-sent time in the future counts as zero elapsed
        let elapsed = (now.with_timezone(&Utc) - last_sent.with_timezone(&Utc))
            .to_std()
            .unwrap_or_default();

        elapsed < window
    }
}
