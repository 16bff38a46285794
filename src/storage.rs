use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::session::ActiveWorkout;
use crate::types::WeightUnit;

pub const DEFAULT_REST_SECONDS: u32 = 90;

const APP_DIR: &str = "ironlog";
const ACTIVE_FILE: &str = "active_workout.json";

/// Key/value config persisted as a flat TOML file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub map: BTreeMap<String, String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Global rest duration applied when an exercise has no override.
    pub fn default_rest_seconds(&self) -> u32 {
        self.map
            .get("default_rest_seconds")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REST_SECONDS)
    }

    /// Display unit applied when an exercise has no override.
    pub fn weight_unit(&self) -> WeightUnit {
        self.map
            .get("weight_unit")
            .and_then(|v| v.parse().ok())
            .unwrap_or(WeightUnit::Kg)
    }

    pub fn db_path(&self) -> Option<String> {
        self.map.get("db_path").cloned()
    }
}

pub fn config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR).join("config.toml"))
        .context("Could not determine config directory")
}

pub fn data_dir() -> Result<PathBuf> {
    let dir = dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .context("Could not determine data directory")?;

    if !dir.exists() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    Ok(dir)
}

pub fn default_db_path() -> Result<String> {
    let path = data_dir()?.join("ironlog.db");
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| anyhow!("Database path is not valid UTF-8: {}", path.display()))
}

fn active_workout_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(ACTIVE_FILE))
}

/// Loads the in-progress workout, if one exists. The workout lives as a
/// scratch JSON file between invocations; completed workouts are moved
/// into the database and the file is removed.
pub fn load_active_workout() -> Result<Option<ActiveWorkout>> {
    read_active_workout(&active_workout_path()?)
}

pub fn save_active_workout(workout: &ActiveWorkout) -> Result<()> {
    write_active_workout(&active_workout_path()?, workout)
}

pub fn clear_active_workout() -> Result<()> {
    remove_active_workout(&active_workout_path()?)
}

fn read_active_workout(path: &Path) -> Result<Option<ActiveWorkout>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read active workout: {}", path.display()))?;

    let workout = serde_json::from_str(&content)
        .with_context(|| format!("Corrupt active workout file: {}", path.display()))?;

    Ok(Some(workout))
}

fn write_active_workout(path: &Path, workout: &ActiveWorkout) -> Result<()> {
    let content = serde_json::to_string_pretty(workout)?;
    fs::write(path, content)
        .with_context(|| format!("Failed to save active workout: {}", path.display()))
}

fn remove_active_workout(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove active workout: {}", path.display()))?;
    }
    Ok(())
}
