//! JournalEngine - owns the ingestion pipeline and everything it feeds.
//!
//! ```text
//! select ─► replay (batch) ─► hand-off ─► tailer thread ─┐
//!                                                        ├─► dispatcher ─► registries ─► observers
//!                          watcher thread ─► tailer.start┘
//! ```
//!
//! Constructed explicitly and passed around; there is no global instance.
//! Every failure in here degrades to an [`IngestSignal`] and a log line.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use flightdeck_core::{load_settings, JournalEngine, NoopReporter, StorageConfig};
//!
//! let (settings, origin) = load_settings(&StorageConfig::from_home()?)?;
//! let engine = JournalEngine::new(settings, origin, Arc::new(NoopReporter));
//! let report = engine.load_recent_missions();
//! ```

use chrono::{DateTime, Utc};
use flightdeck_journal::JournalFileName;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cargo::{read_cargo_snapshot, CargoSnapshot};
use crate::config::{ConfigOrigin, Settings};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::registry::{
    CommanderStatus, DestroyedEntity, MiningSession, Mission, MissionAnomaly, Registries,
    RegistryObserver, ShipTarget,
};
use crate::replay::{replay_files, ReplayReport, TailHandoff};
use crate::reporter::UsageReporter;
use crate::selector::{select_journal_files, SelectionStatus};
use crate::tailer::{LiveTailer, TailState};
use crate::watcher::DirectoryWatcher;

/// Why an ingest came back with less than a full picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestSignal {
    /// No configuration file and nothing found: the user has not set up yet.
    FirstRunConfiguration,
    NoJournalDirectory,
    JournalUnreadable,
    NoJournalFiles,
    NoPlayerIdentity,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub missions: Vec<Mission>,
    pub signal: Option<IngestSignal>,
    pub player_id: Option<String>,
    pub replay: ReplayReport,
}

pub struct JournalEngine {
    settings: Settings,
    origin: ConfigOrigin,
    registries: Arc<Registries>,
    dispatcher: Arc<Dispatcher>,
    tailer: Arc<LiveTailer>,
    watcher: DirectoryWatcher,
    reporter: Arc<dyn UsageReporter>,
    session_started: AtomicBool,
}

impl JournalEngine {
    pub fn new(settings: Settings, origin: ConfigOrigin, reporter: Arc<dyn UsageReporter>) -> Self {
        let registries = Arc::new(Registries::new(
            settings.target_capacity,
            settings.destroyed_capacity,
        ));
        let dispatcher = Arc::new(Dispatcher::standard(registries.clone()));
        let tailer = Arc::new(LiveTailer::new(dispatcher.clone(), settings.poll_interval));
        Self {
            settings,
            origin,
            registries,
            dispatcher,
            tailer,
            watcher: DirectoryWatcher::new(),
            reporter,
            session_started: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn subscribe(&self, observer: Arc<dyn RegistryObserver>) {
        self.registries.bus.subscribe(observer);
    }

    /// Rebuilds state from the recent journals and starts following the
    /// live one.
    pub fn load_recent_missions(&self) -> IngestReport {
        self.load_recent_missions_at(Utc::now())
    }

    /// [`load_recent_missions`](Self::load_recent_missions) with an explicit
    /// clock for the age window.
    pub fn load_recent_missions_at(&self, now: DateTime<Utc>) -> IngestReport {
        self.watcher.stop();
        self.tailer.stop();

        let journal_dir = &self.settings.journal_dir;
        let batch = self.registries.bus.begin_batch();
        self.registries.clear();

        let selection =
            match select_journal_files(journal_dir, self.settings.max_age_days, now) {
                Ok(selection) => selection,
                Err(err) => {
                    tracing::warn!(error = %err, "Journal directory unreadable");
                    drop(batch);
                    return IngestReport {
                        missions: Vec::new(),
                        signal: Some(IngestSignal::JournalUnreadable),
                        player_id: None,
                        replay: ReplayReport::default(),
                    };
                }
            };
        let replay = replay_files(&self.dispatcher, &selection.files);
        drop(batch);

        let signal = match selection.status {
            SelectionStatus::Ready => None,
            SelectionStatus::NoJournalDirectory | SelectionStatus::NoJournalFiles
                if self.origin.is_first_run() =>
            {
                Some(IngestSignal::FirstRunConfiguration)
            }
            SelectionStatus::NoJournalDirectory => Some(IngestSignal::NoJournalDirectory),
            SelectionStatus::NoJournalFiles => Some(IngestSignal::NoJournalFiles),
            SelectionStatus::NoPlayerIdentity => Some(IngestSignal::NoPlayerIdentity),
        };
        if let Some(signal) = signal {
            tracing::info!(?signal, journal_dir = %journal_dir.display(), "Ingest incomplete");
        }

        self.follow_live(replay.handoff.as_ref());
        self.start_usage_session(selection.player_id.as_deref());

        IngestReport {
            missions: self.registries.missions.snapshot(),
            signal,
            player_id: selection.player_id,
            replay,
        }
    }

    /// Picks up where replay stopped. Journals the game created while replay
    /// ran sort after the hand-off file, so the watcher hands them over too.
    fn follow_live(&self, handoff: Option<&TailHandoff>) {
        if let Some(handoff) = handoff {
            if let Err(err) = self.tailer.start_at(&handoff.path, handoff.offset) {
                tracing::warn!(error = %err, "Failed to start journal tailer");
            }
        }
        if self.settings.journal_dir.is_dir() {
            let newer_than = handoff.and_then(|handoff| JournalFileName::from_path(&handoff.path));
            self.start_watcher(newer_than);
        }
    }

    fn start_watcher(&self, newer_than: Option<JournalFileName>) {
        let tailer = self.tailer.clone();
        let on_new_file = Box::new(move |path: std::path::PathBuf| {
            if let Err(err) = tailer.start(&path, true) {
                tracing::warn!(error = %err, path = %path.display(), "Failed to follow new journal");
            }
        });
        let journal_dir = &self.settings.journal_dir;
        if let Err(err) = self.watcher.start_after(journal_dir, newer_than, on_new_file) {
            tracing::warn!(error = %err, "Failed to watch journal directory");
        }
    }

    fn start_usage_session(&self, player_id: Option<&str>) {
        if !self.session_started.swap(true, Ordering::SeqCst) {
            if let Err(err) = self.reporter.start_session() {
                tracing::warn!(error = %err, "Usage reporter failed to start session");
            }
        }
        if let Some(player_id) = player_id {
            if let Err(err) = self.reporter.report_player(player_id) {
                tracing::warn!(error = %err, "Usage reporter failed to record player");
            }
        }
    }

    /// Expires Active missions whose expiry has passed. Hosts call this on a
    /// timer; the journal only reports expiry at login.
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Vec<u64> {
        self.registries.missions.expire_overdue(now)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn missions(&self) -> Vec<Mission> {
        self.registries.missions.snapshot()
    }

    pub fn active_missions(&self) -> Vec<Mission> {
        self.registries.missions.active()
    }

    pub fn anomalies(&self) -> Vec<MissionAnomaly> {
        self.registries.missions.anomalies()
    }

    pub fn commander(&self) -> CommanderStatus {
        self.registries.commander.snapshot()
    }

    pub fn targets(&self) -> Vec<ShipTarget> {
        self.registries.targets.snapshot()
    }

    pub fn destroyed(&self) -> Vec<DestroyedEntity> {
        self.registries.destroyed.snapshot()
    }

    pub fn mining(&self) -> Option<MiningSession> {
        self.registries.mining.current()
    }

    pub fn mining_history(&self) -> Vec<MiningSession> {
        self.registries.mining.history()
    }

    pub fn cargo(&self) -> Result<Option<CargoSnapshot>> {
        read_cargo_snapshot(&self.settings.journal_dir)
    }

    pub fn tail_state(&self) -> TailState {
        self.tailer.state()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_watching()
    }

    /// Stops following the journal and closes the usage session. Safe to
    /// call more than once.
    pub fn shutdown(&self) {
        self.watcher.stop();
        self.tailer.stop();
        if self.session_started.swap(false, Ordering::SeqCst) {
            if let Err(err) = self.reporter.end_session() {
                tracing::warn!(error = %err, "Usage reporter failed to end session");
            }
        }
    }
}

impl Drop for JournalEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
