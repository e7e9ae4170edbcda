use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{sampler::SamplingRequest, tracker::DEFAULT_SUPPRESSION_WINDOW_SECS};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerSettings {
    /// Whether transition batches drive the tracker at all.
    pub tracking_enabled: bool,
    pub suppression_window_secs: i64,
    pub sampling: SamplingRequest,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            tracking_enabled: true,
            suppression_window_secs: DEFAULT_SUPPRESSION_WINDOW_SECS,
            sampling: SamplingRequest::default(),
        }
    }
}

impl TrackerSettings {
    /// Negative values mean no suppression. Values too large for a
    /// `TimeDelta` fall back to the default window.
    pub fn suppression_window(&self) -> TimeDelta {
        let secs = self.suppression_window_secs.max(0);
        TimeDelta::try_seconds(secs).unwrap_or_else(|| {
            log_warn!(
                "Suppression window of {secs}s is out of range; using {DEFAULT_SUPPRESSION_WINDOW_SECS}s"
            );
            TimeDelta::seconds(DEFAULT_SUPPRESSION_WINDOW_SECS)
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    tracker: TrackerSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!(
                    "Ignoring unreadable settings at {}: {err}",
                    path.display()
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn tracker(&self) -> TrackerSettings {
        self.read().tracker.clone()
    }

    pub fn update_tracker(&self, settings: TrackerSettings) -> Result<()> {
        let mut guard = self.write();
        guard.tracker = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
