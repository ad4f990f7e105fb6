//! Configuration management for litteralert
//!
//! Settings are layered: serde defaults, then an optional config file
//! (`config.json` unless overridden), then `LITTERALERT__SECTION__KEY`
//! environment variables. The result is loaded once per invocation.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "LITTERALERT";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device API configuration
    pub device: DeviceConfig,

    /// SMS gateway configuration
    pub sms: SmsConfig,

    /// Alert thresholds
    pub thresholds: ThresholdConfig,

    /// Notification cooldowns
    pub cooldown: CooldownConfig,

    /// Quiet hours window
    pub quiet_hours: QuietHoursConfig,

    /// Morning digest configuration
    pub digest: DigestConfig,

    /// History log configuration
    pub history: HistoryConfig,

    /// SMS quota monitoring
    pub quota: QuotaConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Skip quiet hours and cooldowns. Development only.
    pub test: bool,
}

impl Config {
    /// Load configuration from an optional file path plus environment overrides.
    ///
    /// An explicitly given path must exist; the default `config.json` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: Config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        if t.tray_urgent < t.tray_advisory {
            return Err(Error::config(format!(
                "thresholds.tray_urgent ({}) must be >= thresholds.tray_advisory ({})",
                t.tray_urgent, t.tray_advisory
            )));
        }
        if t.litter_urgent > t.litter_advisory {
            return Err(Error::config(format!(
                "thresholds.litter_urgent ({}) must be <= thresholds.litter_advisory ({})",
                t.litter_urgent, t.litter_advisory
            )));
        }
        if self.quiet_hours.start_hour > 23 || self.quiet_hours.end_hour > 23 {
            return Err(Error::config("quiet_hours hours must be 0-23"));
        }
        if self.digest.hour > 23 {
            return Err(Error::config("digest.hour must be 0-23"));
        }
        if self.digest.enabled && self.quiet_hours.contains(self.digest.hour) {
            return Err(Error::config(format!(
                "digest.hour ({}) falls inside quiet_hours ({}-{})",
                self.digest.hour, self.quiet_hours.start_hour, self.quiet_hours.end_hour
            )));
        }
        if self.device.optimal_litter_level_mm <= 0.0 {
            return Err(Error::config("device.optimal_litter_level_mm must be positive"));
        }
        self.timezone()?;
        Ok(())
    }

    /// Check settings needed by jobs that talk to the SMS gateway
    pub fn validate_sms(&self) -> Result<()> {
        if self.sms.textbelt_key.trim().is_empty() {
            return Err(Error::config("sms.textbelt_key is required"));
        }
        if self.sms.recipients().is_empty() {
            return Err(Error::config("sms.phone must list at least one number"));
        }
        Ok(())
    }

    /// Timezone used for quiet hours and calendar days
    pub fn timezone(&self) -> Result<Tz> {
        Tz::from_str(&self.quiet_hours.timezone).map_err(|e| {
            Error::config(format!(
                "invalid timezone '{}': {e}",
                self.quiet_hours.timezone
            ))
        })
    }
}

/// Device API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// HTTP endpoint returning the robot snapshot JSON
    pub endpoint: Option<String>,
    /// Bearer token for the endpoint
    pub token: Option<String>,
    /// Snapshot file used instead of the endpoint
    pub snapshot_path: Option<PathBuf>,
    /// Optimal litter fill height reported by the robot, in millimetres
    pub optimal_litter_level_mm: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            snapshot_path: None,
            optimal_litter_level_mm: 450.0,
        }
    }
}

/// SMS gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// Textbelt API key
    pub textbelt_key: String,
    /// Comma-separated recipient numbers
    pub phone: String,
    /// Textbelt base URL
    pub base_url: String,
}

impl SmsConfig {
    /// Recipient numbers, trimmed, empty entries dropped
    pub fn recipients(&self) -> Vec<String> {
        self.phone
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            textbelt_key: String::new(),
            phone: String::new(),
            base_url: "https://textbelt.com".to_string(),
        }
    }
}

/// Alert thresholds, all percentages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Tray fullness at or above which an alert is urgent
    pub tray_urgent: f64,
    /// Tray fullness at or above which an alert is advisory
    pub tray_advisory: f64,
    /// Litter remaining at or below which an alert is urgent
    pub litter_urgent: f64,
    /// Litter remaining at or below which an alert is advisory
    pub litter_advisory: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            tray_urgent: 90.0,
            tray_advisory: 70.0,
            litter_urgent: 20.0,
            litter_advisory: 60.0,
        }
    }
}

/// Minimum time between alerts of the same kind and tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    #[serde(with = "humantime_serde")]
    pub urgent: Duration,
    #[serde(with = "humantime_serde")]
    pub advisory: Duration,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            urgent: Duration::from_secs(60 * 60),
            advisory: Duration::from_secs(4 * 60 * 60),
        }
    }
}

/// Local-time window during which nothing is sent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietHoursConfig {
    /// First quiet hour (inclusive)
    pub start_hour: u32,
    /// First hour after the quiet window (exclusive)
    pub end_hour: u32,
    /// IANA timezone name
    pub timezone: String,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            start_hour: 23,
            end_hour: 8,
            timezone: "America/Chicago".to_string(),
        }
    }
}

impl QuietHoursConfig {
    /// Whether a local hour falls in the window. `start_hour > end_hour`
    /// wraps midnight.
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            self.start_hour <= hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Morning digest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Whether the digest is sent at all
    pub enabled: bool,
    /// Local hour during which the digest is due
    pub hour: u32,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: 8,
        }
    }
}

/// History log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Path of the CSV log
    pub path: PathBuf,
    /// Entries older than this are pruned
    pub retention_hours: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("litter_log.csv"),
            retention_hours: 48,
        }
    }
}

/// SMS quota monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Warn when fewer credits than this remain
    pub low_balance_threshold: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            low_balance_threshold: 50,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
