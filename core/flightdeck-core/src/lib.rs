//! # flightdeck-core
//!
//! Journal ingestion and state reconstruction for the flightdeck companion.
//!
//! The game appends one JSON event per line to `Journal.*.log` files. This
//! crate finds the current player's recent journals, replays them to rebuild
//! missions, targets, kills, mining sessions and commander status, then
//! follows the live file and hands over to each new file the game creates.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. Replay runs on the caller's thread;
//!   the watcher and tailer each own one background thread.
//! - **Thread-safe registries**: Every store is `RwLock`-guarded and hands out
//!   cloned snapshots.
//! - **Quiet replays**: Change notifications are held back while a batch is
//!   loading and replaced by a single `BatchCompleted`.
//! - **Graceful degradation**: Missing directories and malformed lines become
//!   signals and skipped lines, never panics.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flightdeck_core::{load_settings, JournalEngine, NoopReporter, StorageConfig};
//!
//! let (settings, origin) = load_settings(&StorageConfig::from_home()?)?;
//! let engine = JournalEngine::new(settings, origin, Arc::new(NoopReporter));
//! engine.subscribe(Arc::new(|change: RegistryChange| println!("{:?}", change)));
//! let report = engine.load_recent_missions();
//! ```

pub mod cargo;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
mod handlers;
mod lines;
pub mod registry;
pub mod replay;
pub mod reporter;
pub mod selector;
pub mod storage;
pub mod tailer;
pub mod watcher;

pub use cargo::{read_cargo_snapshot, CargoItem, CargoSnapshot};
pub use config::{load_settings, load_settings_from, ConfigOrigin, Settings};
pub use dispatch::{Dispatcher, Handler};
pub use engine::{IngestReport, IngestSignal, JournalEngine};
pub use error::{CoreError, Result};
pub use registry::{
    AnomalyKind, BatchGuard, ChangeBus, CommanderStatus, DestroyedEntity, KillCredit,
    MiningLocation, MiningSession, Mission, MissionAnomaly, MissionStatus, RefinedEvent,
    Registries, RegistryChange, RegistryObserver, SessionEnd, SessionPhase, ShipTarget,
    SuspensionPeriod,
};
pub use replay::{replay_files, ReplayReport, TailHandoff};
pub use reporter::{NoopReporter, UsageReporter};
pub use selector::{
    list_journal_files, scan_identities, select_journal_files, JournalSelection, SelectionStatus,
};
pub use storage::StorageConfig;
pub use tailer::{LiveTailer, TailState};
pub use watcher::DirectoryWatcher;
