use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::{location::FixOptions, models::ActivityType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Sampling interval for running, cycling and other movement activities.
    pub movement_cadence_ms: u64,
    /// Sampling interval for stationary activities.
    pub stationary_cadence_ms: u64,
    pub fix_timeout_ms: u64,
    pub high_accuracy: bool,
    pub max_fix_age_ms: u64,
    /// Buffered events per subscriber before slow receivers start lagging.
    pub event_capacity: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            movement_cadence_ms: 3_000,
            stationary_cadence_ms: 15_000,
            fix_timeout_ms: 10_000,
            high_accuracy: true,
            max_fix_age_ms: 0,
            event_capacity: 64,
        }
    }
}

impl TrackerSettings {
    pub fn cadence_for(&self, activity: &ActivityType) -> Duration {
        let ms = if activity.is_movement_based() {
            self.movement_cadence_ms
        } else {
            self.stationary_cadence_ms
        };
        Duration::from_millis(ms.max(1))
    }

    pub fn fix_options(&self) -> FixOptions {
        FixOptions {
            high_accuracy: self.high_accuracy,
            timeout: Duration::from_millis(self.fix_timeout_ms),
            max_age: Duration::from_millis(self.max_fix_age_ms),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<TrackerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            TrackerSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> TrackerSettings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update(&self, settings: TrackerSettings) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &TrackerSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
