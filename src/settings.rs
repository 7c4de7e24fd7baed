use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// User-supplied inputs the completion pipeline needs.
pub trait ProfileProvider: Send + Sync {
    /// Body weight in kilograms, if the user has entered one.
    fn weight_kg(&self) -> Option<f64>;

    fn health_export_enabled(&self) -> bool;
}

/// Fixed profile for embedding without a settings file.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticProfile {
    pub weight_kg: Option<f64>,
    pub health_export_enabled: bool,
}

impl ProfileProvider for StaticProfile {
    fn weight_kg(&self) -> Option<f64> {
        self.weight_kg
    }

    fn health_export_enabled(&self) -> bool {
        self.health_export_enabled
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSettings {
    pub weight_kg: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthExportSettings {
    pub enabled: bool,
    /// Where the JSON-lines exporter writes. Defaults next to the database.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    profile: ProfileSettings,
    health_export: HealthExportSettings,
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
                warn!("Ignoring malformed settings at {}: {err}", path.display());
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

    pub fn profile(&self) -> ProfileSettings {
        self.read().profile.clone()
    }

    pub fn health_export(&self) -> HealthExportSettings {
        self.read().health_export.clone()
    }

    pub fn update_profile(&self, profile: ProfileSettings) -> Result<()> {
        if let Some(weight) = profile.weight_kg {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(anyhow!("weight must be a positive number of kilograms"));
            }
        }

        let mut guard = self.write();
        guard.profile = profile;
        self.persist(&guard)
    }

    pub fn update_health_export(&self, settings: HealthExportSettings) -> Result<()> {
        let mut guard = self.write();
        guard.health_export = settings;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

impl ProfileProvider for SettingsStore {
    fn weight_kg(&self) -> Option<f64> {
        self.read().profile.weight_kg
    }

    fn health_export_enabled(&self) -> bool {
        self.read().health_export.enabled
    }
}
