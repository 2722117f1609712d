//! `Cargo.json`, the hold snapshot the game rewrites beside the journal.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::storage::cargo_snapshot_file;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CargoSnapshot {
    /// `Ship` or `SRV`.
    pub vessel: String,
    pub count: u32,
    pub inventory: Vec<CargoItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CargoItem {
    pub name: String,
    #[serde(rename = "Name_Localised")]
    pub name_localised: Option<String>,
    pub count: u32,
    /// How many of `count` are stolen.
    pub stolen: u32,
}

impl CargoItem {
    pub fn display_name(&self) -> &str {
        self.name_localised.as_deref().unwrap_or(&self.name)
    }
}

/// Reads the snapshot in `journal_dir`. `None` when the game has not
/// written one (or is mid-write and left it empty).
pub fn read_cargo_snapshot(journal_dir: &Path) -> Result<Option<CargoSnapshot>> {
    let path = cargo_snapshot_file(journal_dir);
    let content = match fs_err::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(CoreError::io("reading cargo snapshot", err)),
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| CoreError::Json {
            context: path.display().to_string(),
            source,
        })
}
