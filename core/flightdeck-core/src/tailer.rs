//! Live following of the current journal file.
//!
//! One background thread per followed file. It wakes every poll interval,
//! dispatches the complete lines appended since its cursor, and sleeps on a
//! stop channel so [`LiveTailer::stop`] can wake it immediately.
//!
//! Stopping drains the file once more before the thread exits, so lines the
//! game wrote just before rotating to a new journal are still dispatched.
//!
//! `start`/`stop` are serialized by a control lock; the session slot itself
//! is only locked briefly so observers reading [`LiveTailer::state`] from a
//! change callback never wait on a join. Observers must not start or stop
//! the tailer from a change callback.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::dispatch::Dispatcher;
use crate::error::{CoreError, Result};
use crate::lines::{file_len, read_complete_lines};
use crate::replay::replay_file_from;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TailState {
    Idle,
    Tailing { path: PathBuf, cursor: u64 },
}

enum StopSignal {
    /// Read what is left, then exit.
    Drain,
    /// Exit without reading again.
    Abandon,
}

struct TailSession {
    path: PathBuf,
    cursor: Arc<AtomicU64>,
    stop_tx: mpsc::Sender<StopSignal>,
    handle: JoinHandle<()>,
}

impl TailSession {
    /// Drains and joins the thread, unless we *are* that thread.
    fn shut_down(self) {
        if self.handle.thread().id() == thread::current().id() {
            let _ = self.stop_tx.send(StopSignal::Abandon);
            return;
        }
        let _ = self.stop_tx.send(StopSignal::Drain);
        if self.handle.join().is_err() {
            tracing::warn!(path = %self.path.display(), "Journal tailer thread panicked");
        }
    }
}

pub struct LiveTailer {
    dispatcher: Arc<Dispatcher>,
    poll_interval: Duration,
    control: Mutex<()>,
    session: Mutex<Option<TailSession>>,
}

impl LiveTailer {
    pub fn new(dispatcher: Arc<Dispatcher>, poll_interval: Duration) -> Self {
        Self {
            dispatcher,
            poll_interval,
            control: Mutex::new(()),
            session: Mutex::new(None),
        }
    }

    /// Follows `path`, replacing any current session.
    ///
    /// With `read_existing` the file's current complete lines are replayed
    /// in batch mode first; otherwise tailing begins at the current end.
    pub fn start(&self, path: &Path, read_existing: bool) -> Result<()> {
        let _control = lock(&self.control);
        self.stop_locked();

        let offset = if read_existing {
            let _batch = self.dispatcher.registries().bus.begin_batch();
            replay_file_from(&self.dispatcher, path, 0)
                .map_err(|err| CoreError::io(format!("replaying {}", path.display()), err))?
                .next_offset
        } else {
            file_len(path)
                .map_err(|err| CoreError::io(format!("reading {}", path.display()), err))?
        };
        self.spawn_locked(path, offset)
    }

    /// Follows `path` from an exact byte offset, as handed over by replay.
    pub fn start_at(&self, path: &Path, offset: u64) -> Result<()> {
        let _control = lock(&self.control);
        self.stop_locked();
        self.spawn_locked(path, offset)
    }

    /// Stops following after dispatching the complete lines already on disk.
    /// No line is dispatched after this returns. Safe to call repeatedly.
    pub fn stop(&self) {
        let _control = lock(&self.control);
        self.stop_locked();
    }

    pub fn state(&self) -> TailState {
        match lock(&self.session).as_ref() {
            Some(session) => TailState::Tailing {
                path: session.path.clone(),
                cursor: session.cursor.load(Ordering::SeqCst),
            },
            None => TailState::Idle,
        }
    }

    fn stop_locked(&self) {
        let previous = lock(&self.session).take();
        if let Some(session) = previous {
            tracing::debug!(path = %session.path.display(), "Stopping journal tailer");
            session.shut_down();
        }
    }

    fn spawn_locked(&self, path: &Path, offset: u64) -> Result<()> {
        let cursor = Arc::new(AtomicU64::new(offset));
        let (stop_tx, stop_rx) = mpsc::channel();
        let worker = TailWorker {
            dispatcher: self.dispatcher.clone(),
            path: path.to_path_buf(),
            cursor: cursor.clone(),
            poll_interval: self.poll_interval,
            failing: false,
        };
        let handle = thread::Builder::new()
            .name("journal-tailer".to_string())
            .spawn(move || worker.run(stop_rx))
            .map_err(|err| CoreError::io("spawning journal tailer", err))?;

        tracing::info!(path = %path.display(), offset, "Tailing journal");
        *lock(&self.session) = Some(TailSession {
            path: path.to_path_buf(),
            cursor,
            stop_tx,
            handle,
        });
        Ok(())
    }
}

impl Drop for LiveTailer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct TailWorker {
    dispatcher: Arc<Dispatcher>,
    path: PathBuf,
    cursor: Arc<AtomicU64>,
    poll_interval: Duration,
    failing: bool,
}

impl TailWorker {
    fn run(mut self, stop_rx: mpsc::Receiver<StopSignal>) {
        loop {
            self.poll();
            match stop_rx.recv_timeout(self.poll_interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(StopSignal::Drain) => {
                    self.poll();
                    break;
                }
                Ok(StopSignal::Abandon) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn poll(&mut self) {
        let mut cursor = self.cursor.load(Ordering::SeqCst);
        let len = match file_len(&self.path) {
            Ok(len) => len,
            Err(err) => {
                self.report_failure(&err);
                return;
            }
        };
        if len < cursor {
            tracing::warn!(
                path = %self.path.display(),
                cursor,
                len,
                "Journal shrank below cursor; rereading from start"
            );
            cursor = 0;
            self.cursor.store(0, Ordering::SeqCst);
        }
        if len == cursor {
            return;
        }

        match read_complete_lines(&self.path, cursor) {
            Ok(chunk) => {
                self.failing = false;
                for line in &chunk.lines {
                    self.dispatcher.dispatch_line(line);
                }
                self.cursor.store(chunk.next_offset, Ordering::SeqCst);
            }
            Err(err) => self.report_failure(&err),
        }
    }

    fn report_failure(&mut self, err: &std::io::Error) {
        if !self.failing {
            tracing::warn!(error = %err, path = %self.path.display(), "Failed to read journal");
        }
        self.failing = true;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
