//! End-to-end runs of the cron jobs against a temp log and fake collaborators

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use chrono_tz::America::Chicago;
use chrono_tz::Tz;
use pretty_assertions::assert_eq;

use litteralert::alerting::{NotificationError, SendReceipt, SmsGateway};
use litteralert::device::{DeviceApi, RobotSnapshot};
use litteralert::history::{HistoryLock, HistoryStore, LockMode};
use litteralert::jobs::{run_check, run_cleanup};
use litteralert::models::{EntryKind, LogEntry};
use litteralert::{Config, Error, Result};

struct FakeDevice {
    snapshot: Option<RobotSnapshot>,
}

impl FakeDevice {
    fn reading(tray: f64, litter_mm: f64) -> Self {
        Self {
            snapshot: Some(RobotSnapshot {
                name: "Upstairs".to_string(),
                tray_level: tray,
                litter_level_mm: litter_mm,
                laser_dirty: false,
                scoops_saved: 10,
                pets: Vec::new(),
            }),
        }
    }

    fn offline() -> Self {
        Self { snapshot: None }
    }
}

#[async_trait]
impl DeviceApi for FakeDevice {
    async fn snapshot(&self) -> Result<RobotSnapshot> {
        self.snapshot
            .clone()
            .ok_or_else(|| Error::Io(std::io::Error::other("device offline")))
    }
}

#[derive(Default)]
struct FakeGateway {
    failing: Vec<String>,
    quota: i64,
    sent: Mutex<Vec<(String, String)>>,
    quota_calls: Mutex<usize>,
}

impl FakeGateway {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsGateway for FakeGateway {
    async fn send(
        &self,
        phone: &str,
        message: &str,
    ) -> std::result::Result<SendReceipt, NotificationError> {
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), message.to_string()));
        if self.failing.iter().any(|f| f == phone) {
            return Err(NotificationError::Rejected("bad number".to_string()));
        }
        Ok(SendReceipt {
            quota_remaining: Some(self.quota),
        })
    }

    async fn quota(&self) -> std::result::Result<i64, NotificationError> {
        *self.quota_calls.lock().unwrap() += 1;
        Ok(self.quota)
    }
}

fn config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.sms.textbelt_key = "key".to_string();
    config.sms.phone = "111, 222".to_string();
    config.history.path = dir.path().join("litter_log.csv");
    config
}

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Tz> {
    Chicago.with_ymd_and_hms(2024, 5, day, hour, minute, 0).unwrap()
}

fn entries(config: &Config) -> Vec<LogEntry> {
    HistoryStore::new(&config.history.path).read_all().unwrap()
}

#[tokio::test]
async fn test_check_combines_alerts_and_throttles_repeat() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = HistoryStore::new(&config.history.path);
    // Tray urgent, litter 45mm of 450mm = 10% urgent
    let device = FakeDevice::reading(95.0, 45.0);
    let gateway = FakeGateway::default();

    let first = run_check(&config, &store, &device, &gateway, &at(1, 12, 0))
        .await
        .unwrap();

    let sent = gateway.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, "111");
    assert_eq!(sent[1].0, "222");
    assert!(sent[0].1.starts_with("Litter Robot update for Upstairs:\n"));
    assert!(first.decisions.iter().all(|d| d.entry.sent));

    run_check(&config, &store, &device, &gateway, &at(1, 12, 10))
        .await
        .unwrap();

    assert_eq!(gateway.sent().len(), 2);
    let log = entries(&config);
    let flags: Vec<(EntryKind, bool)> = log.iter().map(|e| (e.kind, e.sent)).collect();
    assert_eq!(
        flags,
        vec![
            (EntryKind::Container, true),
            (EntryKind::Litter, true),
            (EntryKind::Container, false),
            (EntryKind::Litter, false),
        ]
    );
    assert_eq!(log[1].level, 10.0);
}

#[tokio::test]
async fn test_check_in_quiet_hours_only_logs() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = HistoryStore::new(&config.history.path);
    let gateway = FakeGateway::default();

    let outcome = run_check(
        &config,
        &store,
        &FakeDevice::reading(95.0, 400.0),
        &gateway,
        &at(1, 23, 30),
    )
    .await
    .unwrap();

    assert!(gateway.sent().is_empty());
    assert!(outcome.alert.is_none());
    assert_eq!(entries(&config).len(), 2);
    assert!(entries(&config).iter().all(|e| !e.sent));
}

#[tokio::test]
async fn test_failed_recipient_still_records_sent() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = HistoryStore::new(&config.history.path);
    let gateway = FakeGateway {
        failing: vec!["111".to_string()],
        ..FakeGateway::default()
    };

    let outcome = run_check(
        &config,
        &store,
        &FakeDevice::reading(75.0, 400.0),
        &gateway,
        &at(1, 12, 0),
    )
    .await
    .unwrap();

    assert_eq!(gateway.sent().len(), 2);
    assert_eq!(outcome.alert.unwrap().failed(), 1);
    let log = entries(&config);
    assert!(log[0].sent);
    assert!(!log[1].sent);
}

#[tokio::test]
async fn test_device_failure_aborts_without_appending() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = HistoryStore::new(&config.history.path);
    let gateway = FakeGateway::default();

    let result = run_check(&config, &store, &FakeDevice::offline(), &gateway, &at(1, 12, 0)).await;

    assert!(result.is_err());
    assert!(!config.history.path.exists());
    assert!(gateway.sent().is_empty());
}

#[tokio::test]
async fn test_append_failure_aborts_before_any_text() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    config.history.path = dir.path().join("gone").join("litter_log.csv");
    let store = HistoryStore::new(&config.history.path);
    let gateway = FakeGateway::default();

    let result = run_check(
        &config,
        &store,
        &FakeDevice::reading(95.0, 45.0),
        &gateway,
        &at(1, 12, 0),
    )
    .await;

    assert!(matches!(result, Err(Error::Io(_))));
    assert!(gateway.sent().is_empty());
}

/// Records what the log held each time a text went out
struct LogWatchingGateway {
    store: HistoryStore,
    seen: Mutex<Vec<Vec<LogEntry>>>,
}

#[async_trait]
impl SmsGateway for LogWatchingGateway {
    async fn send(
        &self,
        _phone: &str,
        _message: &str,
    ) -> std::result::Result<SendReceipt, NotificationError> {
        let entries = self.store.read_all().unwrap();
        self.seen.lock().unwrap().push(entries);
        Ok(SendReceipt {
            quota_remaining: None,
        })
    }

    async fn quota(&self) -> std::result::Result<i64, NotificationError> {
        Ok(100)
    }
}

#[tokio::test]
async fn test_entries_are_logged_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    config.sms.phone = "111".to_string();
    let store = HistoryStore::new(&config.history.path);
    let gateway = LogWatchingGateway {
        store: store.clone(),
        seen: Mutex::new(Vec::new()),
    };

    run_check(
        &config,
        &store,
        &FakeDevice::reading(95.0, 45.0),
        &gateway,
        &at(2, 8, 5),
    )
    .await
    .unwrap();

    let seen = gateway.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    // Alert: both readings already on disk as sent
    let kinds: Vec<(EntryKind, bool)> = seen[0].iter().map(|e| (e.kind, e.sent)).collect();
    assert_eq!(
        kinds,
        vec![(EntryKind::Container, true), (EntryKind::Litter, true)]
    );
    // Digest: the morning entry precedes its text
    assert_eq!(seen[1].last().map(|e| e.kind), Some(EntryKind::Morning));
}

#[tokio::test]
async fn test_no_digest_inside_quiet_hours() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    config.digest.hour = 6;
    let store = HistoryStore::new(&config.history.path);
    let gateway = FakeGateway::default();

    let outcome = run_check(
        &config,
        &store,
        &FakeDevice::reading(20.0, 400.0),
        &gateway,
        &at(2, 6, 10),
    )
    .await
    .unwrap();

    assert!(outcome.digest.is_none());
    assert!(gateway.sent().is_empty());
    assert!(entries(&config)
        .iter()
        .all(|e| e.kind != EntryKind::Morning));
}

#[tokio::test]
async fn test_morning_digest_sent_once_per_day() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = HistoryStore::new(&config.history.path);
    let device = FakeDevice::reading(20.0, 400.0);
    let gateway = FakeGateway::default();

    let first = run_check(&config, &store, &device, &gateway, &at(2, 8, 5))
        .await
        .unwrap();
    let second = run_check(&config, &store, &device, &gateway, &at(2, 8, 35))
        .await
        .unwrap();

    assert!(first.digest.is_some());
    assert!(second.digest.is_none());
    let mornings: Vec<_> = entries(&config)
        .into_iter()
        .filter(|e| e.kind == EntryKind::Morning)
        .collect();
    assert_eq!(mornings.len(), 1);
    assert_eq!(mornings[0].level, 20.0);
    assert!(gateway.sent()[0]
        .1
        .starts_with("Good morning! Daily digest for Upstairs:"));
}

#[tokio::test]
async fn test_cleanup_prunes_and_warns_primary_on_low_quota() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = HistoryStore::new(&config.history.path);
    let now = at(3, 12, 0);
    for age in [72, 50, 47, 1] {
        store
            .append(&LogEntry::new(
                (now - chrono::Duration::hours(age)).fixed_offset(),
                EntryKind::Container,
                age as f64,
                false,
            ))
            .unwrap();
    }
    let gateway = FakeGateway {
        quota: 12,
        ..FakeGateway::default()
    };

    let outcome = run_cleanup(&config, &store, &gateway, &now, LockMode::FailFast)
        .await
        .unwrap();

    let prune = outcome.prune.unwrap();
    assert_eq!((prune.kept, prune.removed), (2, 2));
    let levels: Vec<f64> = entries(&config).iter().map(|e| e.level).collect();
    assert_eq!(levels, vec![47.0, 1.0]);

    assert_eq!(outcome.quota_remaining, Some(12));
    let sent = gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "111");
    assert!(sent[0].1.contains("currently 11 tokens"));
}

#[tokio::test]
async fn test_cleanup_with_healthy_quota_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = HistoryStore::new(&config.history.path);
    let gateway = FakeGateway {
        quota: 50,
        ..FakeGateway::default()
    };

    let outcome = run_cleanup(&config, &store, &gateway, &at(3, 12, 0), LockMode::FailFast)
        .await
        .unwrap();

    assert!(outcome.low_balance_alert.is_none());
    assert!(gateway.sent().is_empty());
}

#[tokio::test]
async fn test_cleanup_exits_quietly_when_locked() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = HistoryStore::new(&config.history.path);
    let _held = HistoryLock::acquire(&store.lock_path(), LockMode::FailFast).unwrap();
    let gateway = FakeGateway::default();

    let outcome = run_cleanup(&config, &store, &gateway, &at(3, 12, 0), LockMode::FailFast)
        .await
        .unwrap();

    assert!(outcome.prune.is_none());
    assert_eq!(*gateway.quota_calls.lock().unwrap(), 0);
}
