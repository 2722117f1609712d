//! Configuration loading.
//!
//! Settings come from `~/.flightdeck/config.toml`, then environment overrides.
//! A missing file is not an error: defaults apply and the origin is reported
//! as [`ConfigOrigin::Defaults`], which the engine uses to tell a first run
//! apart from a misconfigured one. The engine never writes this file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::storage::StorageConfig;

pub const ENV_JOURNAL_DIR: &str = "FLIGHTDECK_JOURNAL_DIR";
pub const ENV_MAX_AGE_DAYS: &str = "FLIGHTDECK_MAX_AGE_DAYS";

const DEFAULT_MAX_AGE_DAYS: u32 = 7;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_TARGET_CAPACITY: usize = 20;
const DEFAULT_DESTROYED_CAPACITY: usize = 100;

/// On-disk shape; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    journal_dir: Option<PathBuf>,
    max_age_days: Option<u32>,
    poll_interval_ms: Option<u64>,
    target_capacity: Option<usize>,
    destroyed_capacity: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub journal_dir: PathBuf,
    /// Journals whose name encodes a date older than this are not replayed.
    pub max_age_days: u32,
    pub poll_interval: Duration,
    pub target_capacity: usize,
    pub destroyed_capacity: usize,
}

impl Settings {
    pub fn with_journal_dir(journal_dir: impl Into<PathBuf>) -> Self {
        Self {
            journal_dir: journal_dir.into(),
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            target_capacity: DEFAULT_TARGET_CAPACITY,
            destroyed_capacity: DEFAULT_DESTROYED_CAPACITY,
        }
    }

    fn merge(mut self, file: SettingsFile) -> Self {
        if let Some(dir) = file.journal_dir {
            self.journal_dir = dir;
        }
        if let Some(days) = file.max_age_days {
            self.max_age_days = days;
        }
        if let Some(ms) = file.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(capacity) = file.target_capacity {
            self.target_capacity = capacity.max(1);
        }
        if let Some(capacity) = file.destroyed_capacity {
            self.destroyed_capacity = capacity.max(1);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    Defaults,
}

impl ConfigOrigin {
    pub fn is_first_run(&self) -> bool {
        matches!(self, ConfigOrigin::Defaults)
    }
}

/// Loads settings for the given storage roots, applying process env overrides.
pub fn load_settings(storage: &StorageConfig) -> Result<(Settings, ConfigOrigin)> {
    let (settings, origin) = load_settings_from(&storage.config_file(), storage.journal_root())?;
    Ok((
        apply_env_overrides(settings, |key| std::env::var(key).ok()),
        origin,
    ))
}

/// Loads settings from an explicit file path without env overrides.
pub fn load_settings_from(
    path: &Path,
    default_journal_dir: &Path,
) -> Result<(Settings, ConfigOrigin)> {
    let defaults = Settings::with_journal_dir(default_journal_dir);

    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok((defaults, ConfigOrigin::Defaults));
        }
        Err(err) => {
            return Err(CoreError::ConfigRead {
                path: path.to_path_buf(),
                source: err,
            })
        }
    };

    let file = toml::from_str::<SettingsFile>(&content).map_err(|err| {
        CoreError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        }
    })?;

    Ok((defaults.merge(file), ConfigOrigin::File(path.to_path_buf())))
}

pub fn apply_env_overrides(
    mut settings: Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Settings {
    if let Some(dir) = lookup(ENV_JOURNAL_DIR).filter(|value| !value.trim().is_empty()) {
        settings.journal_dir = PathBuf::from(dir);
    }
    if let Some(raw) = lookup(ENV_MAX_AGE_DAYS) {
        match raw.trim().parse::<u32>() {
            Ok(days) => settings.max_age_days = days,
            Err(err) => {
                tracing::warn!(value = %raw, error = %err, "Ignoring invalid {}", ENV_MAX_AGE_DAYS);
            }
        }
    }
    settings
}
