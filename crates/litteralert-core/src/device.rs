//! Device API collaborator
//!
//! The robot's cloud state arrives as a JSON snapshot in the shape the
//! vendor API uses (`DFILevelPercent`, `litterLevel`, ...). The core only
//! needs two readings and the digest facts derived from it.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::models::{DigestFacts, PetSummary, Reading};

/// Raw robot state
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RobotSnapshot {
    #[serde(default = "default_robot_name")]
    pub name: String,

    /// Waste tray fullness, percent
    #[serde(rename = "DFILevelPercent", deserialize_with = "number_or_string")]
    pub tray_level: f64,

    /// Litter height in millimetres
    #[serde(rename = "litterLevel", deserialize_with = "number_or_string")]
    pub litter_level_mm: f64,

    #[serde(rename = "isLaserDirty", default)]
    pub laser_dirty: bool,

    #[serde(rename = "scoopsSavedCount", default)]
    pub scoops_saved: u64,

    #[serde(default)]
    pub pets: Vec<PetSnapshot>,
}

/// Raw per-pet state
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PetSnapshot {
    pub name: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default, alias = "visits")]
    pub visits_24h: u32,
}

fn default_robot_name() -> String {
    "Litter-Robot".to_string()
}

/// The vendor API reports some numeric fields as strings
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl RobotSnapshot {
    /// Litter remaining as a percentage of the optimal fill height
    pub fn litter_percent(&self, optimal_litter_level_mm: f64) -> f64 {
        self.litter_level_mm / optimal_litter_level_mm * 100.0
    }

    /// Tray and litter readings, in that order
    pub fn readings(&self, optimal_litter_level_mm: f64) -> [Reading; 2] {
        [
            Reading::container(self.tray_level),
            Reading::litter(self.litter_percent(optimal_litter_level_mm)),
        ]
    }

    /// Facts for the morning digest
    pub fn digest_facts(&self, optimal_litter_level_mm: f64) -> DigestFacts {
        DigestFacts {
            robot_name: self.name.clone(),
            tray_level: self.tray_level,
            litter_level: self.litter_percent(optimal_litter_level_mm),
            laser_dirty: self.laser_dirty,
            scoops_saved: self.scoops_saved,
            pets: self
                .pets
                .iter()
                .map(|p| PetSummary {
                    name: p.name.clone(),
                    weight_lbs: p.weight,
                    visits_24h: p.visits_24h,
                })
                .collect(),
        }
    }
}

/// Source of robot snapshots
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Fetch the robot's current state
    async fn snapshot(&self) -> Result<RobotSnapshot>;
}

/// Reads the snapshot from an HTTP endpoint
pub struct HttpDeviceApi {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpDeviceApi {
    /// Create a client for `endpoint`
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }
}

#[async_trait]
impl DeviceApi for HttpDeviceApi {
    async fn snapshot(&self) -> Result<RobotSnapshot> {
        let mut request = self.client.get(&self.endpoint);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let snapshot = request
            .send()
            .await?
            .error_for_status()?
            .json::<RobotSnapshot>()
            .await?;

        debug!(endpoint = %self.endpoint, robot = %snapshot.name, "Fetched robot snapshot");
        Ok(snapshot)
    }
}

/// Reads the snapshot from a JSON file written by another process
pub struct FileDeviceApi {
    path: PathBuf,
}

impl FileDeviceApi {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DeviceApi for FileDeviceApi {
    async fn snapshot(&self) -> Result<RobotSnapshot> {
        let contents = tokio::fs::read(&self.path).await?;
        let snapshot = serde_json::from_slice(&contents)?;
        debug!(path = %self.path.display(), "Loaded robot snapshot");
        Ok(snapshot)
    }
}

/// Build the configured device source. A snapshot file wins over an endpoint.
pub fn from_config(config: &DeviceConfig) -> Result<Box<dyn DeviceApi>> {
    match (&config.snapshot_path, &config.endpoint) {
        (Some(path), _) => Ok(Box::new(FileDeviceApi::new(path.clone()))),
        (None, Some(endpoint)) => Ok(Box::new(HttpDeviceApi::new(
            endpoint.clone(),
            config.token.clone(),
        )?)),
        (None, None) => Err(Error::config(
            "device.endpoint or device.snapshot_path is required",
        )),
    }
}
