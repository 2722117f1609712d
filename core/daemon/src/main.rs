//! Flightdeck daemon entrypoint.
//!
//! Headless host for the journal engine: resolves paths, loads settings,
//! replays the recent journals and then logs every registry change while
//! the tailer and watcher follow the game.

use chrono::Utc;
use std::env;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use flightdeck_core::config::apply_env_overrides;
use flightdeck_core::{
    load_settings, ConfigOrigin, IngestReport, JournalEngine, NoopReporter, RegistryChange,
    Settings, StorageConfig,
};

const DEBUG_ENV: &str = "FLIGHTDECK_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "daemon.log";
const MISSION_EXPIRY_INTERVAL_SECS: u64 = 60;
const WATCH_CHECK_INTERVAL_SECS: u64 = 5;

fn main() {
    let storage = StorageConfig::from_home();
    let _log_guard = init_logging(storage.as_ref().ok().map(StorageConfig::logs_dir));

    let storage = match storage {
        Ok(storage) => storage,
        Err(err) => {
            error!(error = %err, "Failed to resolve flightdeck directories");
            std::process::exit(1);
        }
    };

    let (settings, origin) = match load_settings(&storage) {
        Ok(loaded) => loaded,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            let defaults = Settings::with_journal_dir(storage.journal_root());
            (
                apply_env_overrides(defaults, |key| env::var(key).ok()),
                ConfigOrigin::File(storage.config_file()),
            )
        }
    };
    info!(
        journal_dir = %settings.journal_dir.display(),
        max_age_days = settings.max_age_days,
        "Flightdeck daemon started"
    );

    let engine = Arc::new(JournalEngine::new(settings, origin, Arc::new(NoopReporter)));
    let (tx, rx) = mpsc::channel();
    engine.subscribe(Arc::new(move |change: RegistryChange| {
        let _ = tx.send(change);
    }));

    let report = engine.load_recent_missions();
    log_ingest(&report);
    let expiry = MissionExpiry::spawn(
        Arc::clone(&engine),
        Duration::from_secs(MISSION_EXPIRY_INTERVAL_SECS),
    );

    let watching = engine.is_watching();
    loop {
        match rx.recv_timeout(Duration::from_secs(WATCH_CHECK_INTERVAL_SECS)) {
            Ok(change) => log_change(&engine, change),
            Err(RecvTimeoutError::Timeout) if watching && !engine.is_watching() => {
                error!("Journal directory watcher stopped; shutting down");
                break;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    expiry.stop();
    engine.shutdown();
    info!("Flightdeck daemon stopped");
}

fn log_ingest(report: &IngestReport) {
    let active = report.missions.iter().filter(|mission| mission.is_active()).count();
    info!(
        player_id = report.player_id.as_deref().unwrap_or("-"),
        files = report.replay.files,
        lines = report.replay.lines,
        skipped = report.replay.skipped,
        missions = report.missions.len(),
        active,
        "Journal ingest complete"
    );
    if let Some(signal) = report.signal {
        warn!(?signal, "Journal ingest incomplete");
    }
}

fn log_change(engine: &JournalEngine, change: RegistryChange) {
    match change {
        RegistryChange::Commander => {
            let status = engine.commander();
            info!(
                system = status.system.as_deref().unwrap_or("-"),
                station = status.station.as_deref().unwrap_or("-"),
                online = status.online,
                "Commander updated"
            );
        }
        RegistryChange::Missions => {
            for mission in engine.active_missions() {
                debug!(
                    mission_id = mission.id,
                    name = %mission.name,
                    progress = %format!("{}/{}", mission.current_count, mission.target_count),
                    "Active mission"
                );
            }
        }
        RegistryChange::Mining => {
            if let Some(session) = engine.mining() {
                info!(
                    session_id = session.id,
                    ring = %session.location.ring,
                    refined = session.refined.len(),
                    prospected = session.prospected,
                    per_hour = session.refined_per_hour(Utc::now()),
                    "Mining session updated"
                );
            }
        }
        RegistryChange::Targets => debug!(targets = engine.targets().len(), "Targets updated"),
        RegistryChange::Destroyed => debug!(kills = engine.destroyed().len(), "Kill log updated"),
        RegistryChange::BatchCompleted => {
            info!(
                missions = engine.missions().len(),
                anomalies = engine.anomalies().len(),
                "Journal batch loaded"
            );
        }
    }
}

/// Sweeps overdue missions on a timer; the journal only reports expiry at
/// login.
struct MissionExpiry {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl MissionExpiry {
    fn spawn(engine: Arc<JournalEngine>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
            let expired = engine.expire_overdue(Utc::now());
            if !expired.is_empty() {
                info!(missions = ?expired, "Expired overdue missions");
            }
        });
        Self { stop_tx, handle }
    }

    fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.handle.join().is_err() {
            warn!("Mission expiry thread panicked");
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

/// Logs to stderr and, when the logs directory is usable, to a daily
/// rolling file. The returned guard flushes the file writer on drop.
fn init_logging(logs_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let debug_enabled = env::var(DEBUG_ENV)
        .map(|value| is_truthy(&value))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let file_appender = logs_dir.and_then(|dir| {
        fs_err::create_dir_all(&dir).ok()?;
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .build(&dir)
            .ok()
    });

    let stderr_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);
    match file_appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}
