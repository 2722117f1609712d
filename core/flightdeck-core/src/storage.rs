//! Path management for flightdeck data.
//!
//! Two roots matter: flightdeck's own directory (`~/.flightdeck`, holding the
//! config file and logs) and the game's journal directory. Tests inject both
//! through [`StorageConfig::with_roots`].

use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Journal location relative to the home directory on a default install.
const DEFAULT_JOURNAL_SUBDIR: [&str; 3] = ["Saved Games", "Frontier Developments", "Elite Dangerous"];

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for flightdeck data (default: ~/.flightdeck)
    root: PathBuf,
    /// Directory the game writes journals to
    journal_root: PathBuf,
}

impl StorageConfig {
    /// Resolves the default roots under the user's home directory.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(CoreError::HomeDirNotFound)?;
        let journal_root = DEFAULT_JOURNAL_SUBDIR
            .iter()
            .fold(home.clone(), |path, part| path.join(part));
        Ok(Self {
            root: home.join(".flightdeck"),
            journal_root,
        })
    }

    /// Creates a StorageConfig with both roots supplied.
    /// Used for testing with temp directories.
    pub fn with_roots(root: PathBuf, journal_root: PathBuf) -> Self {
        Self { root, journal_root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Default journal directory; the config file may override it.
    pub fn journal_root(&self) -> &Path {
        &self.journal_root
    }

    /// Path to config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to the logs/ directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

/// `Cargo.json` snapshot written by the game next to the journals.
pub fn cargo_snapshot_file(journal_dir: &Path) -> PathBuf {
    journal_dir.join("Cargo.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_injected_roots() {
        let storage =
            StorageConfig::with_roots(PathBuf::from("/tmp/fd"), PathBuf::from("/tmp/journals"));
        assert_eq!(storage.config_file(), PathBuf::from("/tmp/fd/config.toml"));
        assert_eq!(storage.logs_dir(), PathBuf::from("/tmp/fd/logs"));
        assert_eq!(storage.journal_root(), Path::new("/tmp/journals"));
        assert_eq!(
            cargo_snapshot_file(storage.journal_root()),
            PathBuf::from("/tmp/journals/Cargo.json")
        );
    }
}
