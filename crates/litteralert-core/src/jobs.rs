//! Scheduled jobs
//!
//! Each job is one short-lived invocation started by cron: `check` samples
//! the robot and alerts, `cleanup` prunes the log and watches the SMS
//! balance. They share the history log but nothing in memory.

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use tracing::{info, warn};

use crate::alerting::{
    messages, AlertEngine, DigestAggregator, DispatchReport, NotificationSender, SmsGateway,
};
use crate::config::Config;
use crate::device::DeviceApi;
use crate::error::Result;
use crate::history::{HistoryStore, LockMode, PruneReport, RetentionManager};
use crate::models::{Decision, LogEntry};

/// What a `check` run did
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub decisions: Vec<Decision>,
    pub alert: Option<DispatchReport>,
    pub digest: Option<DispatchReport>,
}

/// One sampling cycle.
///
/// Readings are evaluated against the history before anything is written.
/// The cycle's entries are appended in one write before any text goes out,
/// so a failed append aborts the cycle without dispatching and a `sent`
/// row always exists for a dispatched alert. Alerts due in this cycle go
/// out as a single text. Delivery failures are logged and never abort.
pub async fn run_check<T: TimeZone>(
    config: &Config,
    store: &HistoryStore,
    device: &dyn DeviceApi,
    gateway: &dyn SmsGateway,
    now: &DateTime<T>,
) -> Result<CheckOutcome> {
    let engine = AlertEngine::new(config)?;
    let aggregator = DigestAggregator::new(config)?;
    let recipients = config.sms.recipients();
    let sender = NotificationSender::new(gateway);

    store.ensure_header()?;

    let snapshot = device.snapshot().await?;
    let optimal_mm = config.device.optimal_litter_level_mm;
    let history = store.read_all()?;

    let mut decisions = Vec::new();
    let mut parts = Vec::new();
    for reading in snapshot.readings(optimal_mm) {
        let decision = engine.decide(&reading, now, &history);
        if decision.should_send() {
            parts.extend(messages::alert_message(&reading, decision.tier));
        } else if let Some(reason) = decision.suppressed_reason {
            info!(kind = %reading.kind, tier = %decision.tier, %reason, "Alert suppressed");
        }
        decisions.push(decision);
    }

    let entries: Vec<LogEntry> = decisions.iter().map(|d| d.entry.clone()).collect();
    store.append_all(&entries)?;

    let alert = match messages::combine(&snapshot.name, &parts) {
        Some(message) => {
            let report = sender.dispatch(&recipients, &message).await;
            warn_on_failures("alert", &report);
            Some(report)
        }
        None => {
            info!("No alert due");
            None
        }
    };

    let mut digest_report = None;
    let today = store.read_since(&aggregator.start_of_day(now))?;
    if let Some(digest) = aggregator.build_digest(now, &today, &snapshot.digest_facts(optimal_mm)) {
        store.append(&digest.entry)?;
        let report = sender.dispatch(&recipients, &digest.message).await;
        warn_on_failures("digest", &report);
        info!("Morning digest sent");
        digest_report = Some(report);
    }

    Ok(CheckOutcome {
        decisions,
        alert,
        digest: digest_report,
    })
}

/// What a `cleanup` run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupOutcome {
    /// `None` when another prune held the lock
    pub prune: Option<PruneReport>,
    pub quota_remaining: Option<i64>,
    pub low_balance_alert: Option<DispatchReport>,
}

/// Prune the log, then warn the primary recipient if SMS credits run low.
///
/// Lock contention ends the run quietly; the next scheduled run retries.
pub async fn run_cleanup<T: TimeZone>(
    config: &Config,
    store: &HistoryStore,
    gateway: &dyn SmsGateway,
    now: &DateTime<T>,
    mode: LockMode,
) -> Result<CleanupOutcome> {
    let manager = RetentionManager::new(store.clone(), mode);

    let prune = match manager.prune(now, config.history.retention_hours) {
        Ok(report) => report,
        Err(e) if e.is_lock_contention() => {
            info!(error = %e, "Another cleanup is running, skipping");
            return Ok(CleanupOutcome::default());
        }
        Err(e) => return Err(e),
    };

    let mut outcome = CleanupOutcome {
        prune: Some(prune),
        ..CleanupOutcome::default()
    };

    let remaining = match gateway.quota().await {
        Ok(remaining) => remaining,
        Err(e) => {
            warn!(error = %e, "Could not check SMS quota");
            return Ok(outcome);
        }
    };
    outcome.quota_remaining = Some(remaining);

    if remaining < config.quota.low_balance_threshold {
        let primary: Vec<String> = config.sms.recipients().into_iter().take(1).collect();
        let report = NotificationSender::new(gateway)
            .dispatch(&primary, &messages::low_quota_message(remaining))
            .await;
        warn_on_failures("low balance", &report);
        outcome.low_balance_alert = Some(report);
    } else {
        info!(remaining, "SMS quota fine");
    }

    Ok(outcome)
}

fn warn_on_failures(what: &str, report: &DispatchReport) {
    if let Err(e) = report.clone().into_result() {
        warn!(notification = what, error = %e, "Some recipients were not notified");
    }
}
