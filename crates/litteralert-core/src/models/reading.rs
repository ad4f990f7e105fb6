//! Sensor readings and digest facts supplied by the device collaborator

use serde::{Deserialize, Serialize};

use super::entry::EntryKind;

/// A single sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// `Container` or `Litter`
    pub kind: EntryKind,
    /// Tray fullness or litter remaining, as a percentage
    pub level: f64,
}

impl Reading {
    /// Waste tray fullness reading
    pub fn container(level: f64) -> Self {
        Self {
            kind: EntryKind::Container,
            level,
        }
    }

    /// Litter remaining reading
    pub fn litter(level: f64) -> Self {
        Self {
            kind: EntryKind::Litter,
            level,
        }
    }
}

/// Per-pet summary for the digest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetSummary {
    pub name: String,
    /// Last recorded weight in pounds
    pub weight_lbs: Option<f64>,
    /// Visits over the past 24 hours
    pub visits_24h: u32,
}

/// Facts for the digest that the history log cannot provide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestFacts {
    /// Display name of the robot
    pub robot_name: String,
    /// Current tray fullness percentage
    pub tray_level: f64,
    /// Current litter remaining percentage
    pub litter_level: f64,
    pub laser_dirty: bool,
    /// Lifetime scoops saved counter
    pub scoops_saved: u64,
    pub pets: Vec<PetSummary>,
}
