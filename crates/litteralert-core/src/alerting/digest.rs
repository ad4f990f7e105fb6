//! Once-daily morning digest

use chrono::{DateTime, LocalResult, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::models::{DigestFacts, EntryKind, LogEntry};

/// Min, max and latest level of one kind over a day
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelStats {
    pub min: f64,
    pub max: f64,
    pub last: f64,
}

impl LevelStats {
    fn from_levels(levels: impl IntoIterator<Item = f64>) -> Option<Self> {
        levels.into_iter().fold(None, |stats, level| {
            Some(match stats {
                None => Self {
                    min: level,
                    max: level,
                    last: level,
                },
                Some(s) => Self {
                    min: s.min.min(level),
                    max: s.max.max(level),
                    last: level,
                },
            })
        })
    }
}

/// Readings of the current calendar day
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DaySummary {
    pub tray: Option<LevelStats>,
    pub litter: Option<LevelStats>,
}

impl DaySummary {
    /// Summarise container and litter entries
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        let levels = |kind: EntryKind| {
            entries
                .iter()
                .filter(move |e| e.kind == kind)
                .map(|e| e.level)
        };

        Self {
            tray: LevelStats::from_levels(levels(EntryKind::Container)),
            litter: LevelStats::from_levels(levels(EntryKind::Litter)),
        }
    }
}

/// A digest ready to dispatch, with the entry to append afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub message: String,
    pub summary: DaySummary,
    pub entry: LogEntry,
}

/// Builds the morning digest at most once per local calendar day.
///
/// Whether today's digest already went out is read from the history alone:
/// any `morning` entry dated today counts.
#[derive(Debug, Clone)]
pub struct DigestAggregator<'a> {
    config: &'a Config,
    timezone: Tz,
}

impl<'a> DigestAggregator<'a> {
    /// Create an aggregator for one invocation's configuration
    pub fn new(config: &'a Config) -> Result<Self> {
        Ok(Self {
            config,
            timezone: config.timezone()?,
        })
    }

    /// Local midnight of the day containing `now`
    pub fn start_of_day<T: TimeZone>(&self, now: &DateTime<T>) -> DateTime<Tz> {
        let local = now.with_timezone(&self.timezone);
        let midnight = local.date_naive().and_time(chrono::NaiveTime::MIN);

        match self.timezone.from_local_datetime(&midnight) {
            LocalResult::Single(start) => start,
            LocalResult::Ambiguous(earliest, _) => earliest,
            // Midnight skipped by a DST change; the day starts at its first valid hour.
            LocalResult::None => {
                let one = midnight + chrono::Duration::hours(1);
                self.timezone
                    .from_local_datetime(&one)
                    .earliest()
                    .unwrap_or(local)
            }
        }
    }

    /// Whether `history` already has a digest dated on `now`'s local day
    pub fn already_sent<T: TimeZone>(&self, now: &DateTime<T>, history: &[LogEntry]) -> bool {
        let today = now.with_timezone(&self.timezone).date_naive();
        history.iter().any(|e| {
            e.kind == EntryKind::Morning && e.timestamp.with_timezone(&self.timezone).date_naive() == today
        })
    }

    /// Build today's digest if it is due.
    ///
    /// `history` should be the result of `read_since(start_of_day(now))`.
    /// Nothing is built during quiet hours. Test mode lifts the hour and
    /// quiet-hour restrictions but never the once-per-day rule.
    pub fn build_digest<T: TimeZone>(
        &self,
        now: &DateTime<T>,
        history: &[LogEntry],
        facts: &DigestFacts,
    ) -> Option<Digest> {
        let local = now.with_timezone(&self.timezone);

        if !self.config.digest.enabled {
            return None;
        }
        if !self.config.test {
            if local.hour() != self.config.digest.hour {
                debug!(hour = local.hour(), "Digest not due at this hour");
                return None;
            }
            if self.config.quiet_hours.contains(local.hour()) {
                debug!(hour = local.hour(), "Digest hour falls in quiet hours");
                return None;
            }
        }
        if self.already_sent(&local, history) {
            debug!(date = %local.date_naive(), "Digest already sent today");
            return None;
        }

        let start = self.start_of_day(&local).with_timezone(&Utc);
        let today: Vec<LogEntry> = history
            .iter()
            .filter(|e| e.timestamp.with_timezone(&Utc) >= start)
            .cloned()
            .collect();
        let summary = DaySummary::from_entries(&today);

        Some(Digest {
            message: render(facts, &summary),
            summary,
            entry: LogEntry::new(local.fixed_offset(), EntryKind::Morning, facts.tray_level, true),
        })
    }
}

fn render(facts: &DigestFacts, summary: &DaySummary) -> String {
    let mut lines = vec![
        format!("Good morning! Daily digest for {}:", facts.robot_name),
        format!("Waste receptacle: {:.1}%", facts.tray_level),
        format!("Litter level: {:.1}%", facts.litter_level),
        format!(
            "Laser dirty: {}",
            if facts.laser_dirty { "Yes" } else { "No" }
        ),
        format!("Scoops saved: {}", facts.scoops_saved),
    ];

    if let Some(tray) = summary.tray {
        lines.push(format!(
            "Tray today: {:.1}-{:.1}% (last {:.1}%)",
            tray.min, tray.max, tray.last
        ));
    }
    if let Some(litter) = summary.litter {
        lines.push(format!(
            "Litter today: {:.1}-{:.1}% (last {:.1}%)",
            litter.min, litter.max, litter.last
        ));
    }

    if !facts.pets.is_empty() {
        lines.push(String::new());
        lines.push("Pets:".to_string());
        for pet in &facts.pets {
            let weight = match pet.weight_lbs {
                Some(w) if w > 0.0 => format!("{w:.1} lbs"),
                _ => "unknown".to_string(),
            };
            lines.push(format!(
                "  {}: last weight {weight}, {} visit(s) in last 24h",
                pet.name, pet.visits_24h
            ));
        }
    }

    lines.join("\n")
}
