//! Watches the journal directory for newly created journal files.
//!
//! The game starts a fresh `Journal.*.log` at every launch and on rotation.
//! Each new file is handed to the callback exactly once; the engine uses it
//! to move the tailer over.
//!
//! [`DirectoryWatcher::start_after`] closes the gap between selecting files
//! and subscribing: journals already present but newer than the given one
//! are handed off first, in order, before any live event.

use flightdeck_journal::JournalFileName;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::error::{CoreError, Result};
use crate::selector::list_journal_files;

pub type NewFileCallback = Box<dyn Fn(PathBuf) + Send + 'static>;

enum WatchMessage {
    Fs(notify::Result<Event>),
    Shutdown,
}

struct WatchSession {
    directory: PathBuf,
    // Dropping the watcher releases the OS subscription.
    watcher: RecommendedWatcher,
    tx: Sender<WatchMessage>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct DirectoryWatcher {
    session: Mutex<Option<WatchSession>>,
}

impl DirectoryWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts watching `directory`. Files present now are never handed off.
    /// A no-op while already watching.
    pub fn start(&self, directory: &Path, on_new_file: NewFileCallback) -> Result<()> {
        self.start_after(directory, None, on_new_file)
    }

    /// Like [`start`](Self::start), but journals already present that sort
    /// after `newer_than` are handed off as if they had just been created.
    pub fn start_after(
        &self,
        directory: &Path,
        newer_than: Option<JournalFileName>,
        on_new_file: NewFileCallback,
    ) -> Result<()> {
        let mut slot = lock(&self.session);
        if slot.as_ref().is_some_and(|session| !session.handle.is_finished()) {
            tracing::debug!("Journal directory watcher already running");
            return Ok(());
        }
        if let Some(stale) = slot.take() {
            stale.shut_down();
        }

        let (tx, rx) = mpsc::channel();
        let fs_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = fs_tx.send(WatchMessage::Fs(res));
        })
        .map_err(|source| CoreError::Watch {
            path: directory.to_path_buf(),
            source,
        })?;
        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|source| CoreError::Watch {
                path: directory.to_path_buf(),
                source,
            })?;

        // Listed after subscribing so a file created in between is either
        // listed or reported, and `seen` drops the duplicate. Keyed by name
        // since notify may report a differently spelled path.
        let existing = list_journal_files(directory).unwrap_or_default();
        let pending: Vec<PathBuf> = match newer_than {
            Some(floor) => existing
                .iter()
                .filter(|(name, _)| *name > floor)
                .map(|(_, path)| path.clone())
                .collect(),
            None => Vec::new(),
        };
        let seen: HashSet<JournalFileName> = existing.into_iter().map(|(name, _)| name).collect();

        let watched = directory.to_path_buf();
        let handle = thread::Builder::new()
            .name("journal-watcher".to_string())
            .spawn(move || watch_loop(&watched, rx, seen, pending, on_new_file))
            .map_err(|err| CoreError::io("spawning journal watcher", err))?;

        tracing::info!(directory = %directory.display(), "Watching journal directory");
        *slot = Some(WatchSession {
            directory: directory.to_path_buf(),
            watcher,
            tx,
            handle,
        });
        Ok(())
    }

    /// Stops watching and joins the thread. Safe to call repeatedly.
    pub fn stop(&self) {
        let session = lock(&self.session).take();
        if let Some(session) = session {
            tracing::debug!(directory = %session.directory.display(), "Stopping journal watcher");
            session.shut_down();
        }
    }

    pub fn is_watching(&self) -> bool {
        lock(&self.session)
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl WatchSession {
    fn shut_down(self) {
        let WatchSession {
            watcher, tx, handle, ..
        } = self;
        drop(watcher);
        let _ = tx.send(WatchMessage::Shutdown);
        if handle.thread().id() != thread::current().id() && handle.join().is_err() {
            tracing::warn!("Journal watcher thread panicked");
        }
    }
}

fn watch_loop(
    directory: &Path,
    rx: Receiver<WatchMessage>,
    mut seen: HashSet<JournalFileName>,
    pending: Vec<PathBuf>,
    on_new_file: NewFileCallback,
) {
    for path in pending {
        tracing::info!(path = %path.display(), "Journal appeared before watch started");
        on_new_file(path);
    }
    while let Ok(message) = rx.recv() {
        match message {
            WatchMessage::Shutdown => break,
            WatchMessage::Fs(Err(err)) => {
                tracing::error!(
                    error = %err,
                    directory = %directory.display(),
                    "Journal directory watch failed; watcher stopped"
                );
                break;
            }
            WatchMessage::Fs(Ok(event)) => {
                if !matches!(event.kind, EventKind::Create(_)) {
                    continue;
                }
                for path in event.paths {
                    let Some(name) = JournalFileName::from_path(&path) else {
                        continue;
                    };
                    if !seen.insert(name) {
                        continue;
                    }
                    tracing::info!(path = %path.display(), "New journal file");
                    on_new_file(path);
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
