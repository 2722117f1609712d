//! Picks the journal files that belong to the current player.
//!
//! The player is whoever the newest journal with an identity event says it
//! is. Older files are kept only if they fall inside the age window and
//! declare the same player id, so a shared machine never mixes commanders.

use chrono::{DateTime, Days, NaiveDate, Utc};
use flightdeck_journal::{identity_of, parse_line, JournalFileName, PLAYER_ID_FIELD};
use serde::Serialize;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStatus {
    Ready,
    NoJournalDirectory,
    NoJournalFiles,
    NoPlayerIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalSelection {
    pub player_id: Option<String>,
    /// Chronological: encoded start time, then sequence number.
    pub files: Vec<PathBuf>,
    pub status: SelectionStatus,
}

impl JournalSelection {
    fn empty(status: SelectionStatus) -> Self {
        Self {
            player_id: None,
            files: Vec::new(),
            status,
        }
    }
}

/// Journal files directly inside `dir`, oldest first.
///
/// A missing directory yields an empty list; one that exists but cannot be
/// listed is an error.
pub fn list_journal_files(dir: &Path) -> Result<Vec<(JournalFileName, PathBuf)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("journal directory walk failed"));
                return Err(CoreError::JournalDirUnreadable {
                    path: dir.to_path_buf(),
                    source,
                });
            }
            Err(err) => {
                tracing::debug!(error = %err, "Skipping unreadable journal directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = JournalFileName::from_path(entry.path()) {
            files.push((name, entry.into_path()));
        }
    }
    files.sort();
    Ok(files)
}

/// Player ids declared by identity events in `path`, in file order.
pub fn scan_identities(path: &Path) -> io::Result<Vec<String>> {
    let reader = BufReader::new(fs_err::File::open(path)?);
    let mut ids = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.contains(PLAYER_ID_FIELD) {
            continue;
        }
        let Ok(record) = parse_line(&line) else {
            continue;
        };
        if let Some(identity) = identity_of(&record) {
            ids.push(identity.player_id);
        }
    }
    Ok(ids)
}

/// Oldest journal date inside the window. Windows reaching past the
/// earliest representable date keep everything.
fn age_cutoff(now: DateTime<Utc>, max_age_days: u32) -> NaiveDate {
    now.checked_sub_days(Days::new(u64::from(max_age_days)))
        .map(|start| start.date_naive())
        .unwrap_or(NaiveDate::MIN)
}

/// Selects the current player's journals started within `max_age_days` of
/// `now`.
pub fn select_journal_files(
    dir: &Path,
    max_age_days: u32,
    now: DateTime<Utc>,
) -> Result<JournalSelection> {
    if !dir.is_dir() {
        if dir.exists() {
            return Err(CoreError::JournalDirUnreadable {
                path: dir.to_path_buf(),
                source: io::Error::other("not a directory"),
            });
        }
        return Ok(JournalSelection::empty(SelectionStatus::NoJournalDirectory));
    }

    let cutoff = age_cutoff(now, max_age_days);
    let candidates: Vec<PathBuf> = list_journal_files(dir)?
        .into_iter()
        .filter(|(name, _)| name.date() >= cutoff)
        .map(|(_, path)| path)
        .collect();
    if candidates.is_empty() {
        return Ok(JournalSelection::empty(SelectionStatus::NoJournalFiles));
    }

    let scanned: Vec<(PathBuf, Vec<String>)> = candidates
        .into_iter()
        .map(|path| {
            let ids = scan_identities(&path).unwrap_or_else(|err| {
                tracing::warn!(
                    error = %err,
                    path = %path.display(),
                    "Failed to scan journal for player identity"
                );
                Vec::new()
            });
            (path, ids)
        })
        .collect();

    let Some(player_id) = scanned
        .iter()
        .rev()
        .find_map(|(_, ids)| ids.last().cloned())
    else {
        return Ok(JournalSelection::empty(SelectionStatus::NoPlayerIdentity));
    };

    let files: Vec<PathBuf> = scanned
        .into_iter()
        .filter(|(_, ids)| ids.iter().any(|id| *id == player_id))
        .map(|(path, _)| path)
        .collect();

    tracing::debug!(
        player_id = %player_id,
        files = files.len(),
        "Selected journal files"
    );
    Ok(JournalSelection {
        player_id: Some(player_id),
        files,
        status: SelectionStatus::Ready,
    })
}
