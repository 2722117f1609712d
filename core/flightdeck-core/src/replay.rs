//! Historical replay of selected journal files.
//!
//! Every line is dispatched in file order under one batch guard, so
//! observers hear a single `BatchCompleted` once the whole history is in.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::dispatch::Dispatcher;
use crate::lines::read_complete_lines;

/// Where the tailer should pick up after replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TailHandoff {
    pub path: PathBuf,
    pub offset: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub files: usize,
    pub lines: usize,
    /// Malformed lines that were skipped.
    pub skipped: usize,
    pub handoff: Option<TailHandoff>,
}

impl ReplayReport {
    fn absorb(&mut self, other: FileReplay) {
        self.lines += other.lines;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Default)]
pub(crate) struct FileReplay {
    pub lines: usize,
    pub skipped: usize,
    pub next_offset: u64,
}

/// Replays `files` in order with notifications suppressed.
///
/// A file that cannot be read is logged and skipped. The hand-off points at
/// the last file just past its last complete line.
pub fn replay_files(dispatcher: &Dispatcher, files: &[PathBuf]) -> ReplayReport {
    let _batch = dispatcher.registries().bus.begin_batch();
    let mut report = ReplayReport::default();

    for path in files {
        match replay_file_from(dispatcher, path, 0) {
            Ok(file) => {
                report.files += 1;
                report.handoff = Some(TailHandoff {
                    path: path.clone(),
                    offset: file.next_offset,
                });
                report.absorb(file);
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    path = %path.display(),
                    "Failed to replay journal file"
                );
            }
        }
    }

    tracing::debug!(
        files = report.files,
        lines = report.lines,
        skipped = report.skipped,
        "Journal replay finished"
    );
    report
}

/// Dispatches the complete lines of one file from `offset`. The caller
/// decides whether this runs under a batch guard.
pub(crate) fn replay_file_from(
    dispatcher: &Dispatcher,
    path: &Path,
    offset: u64,
) -> std::io::Result<FileReplay> {
    let chunk = read_complete_lines(path, offset)?;
    let mut replay = FileReplay {
        next_offset: chunk.next_offset,
        ..FileReplay::default()
    };
    for line in &chunk.lines {
        if dispatcher.dispatch_line(line) {
            replay.lines += 1;
        } else {
            replay.skipped += 1;
        }
    }
    Ok(replay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::bus::tests::Recorder;
    use crate::registry::{RegistryChange, Registries};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn replays_files_in_order_and_reports_handoff() {
        let dir = tempdir().expect("tempdir");
        let first = dir.path().join("Journal.2024-03-01T100000.01.log");
        let second = dir.path().join("Journal.2024-03-01T120000.01.log");
        fs_err::write(
            &first,
            concat!(
                r#"{"timestamp":"2024-03-01T10:00:00Z","event":"Commander","FID":"F1","Name":"Jameson"}"#,
                "\n",
                "garbage\n",
            ),
        )
        .expect("write first");
        let second_body = concat!(
            r#"{"timestamp":"2024-03-01T12:00:00Z","event":"FSDJump","StarSystem":"Lave"}"#,
            "\n",
            r#"{"timestamp":"2024-03-01T12:00:05Z","event":"Docked","#,
        );
        fs_err::write(&second, second_body).expect("write second");

        let registries = Arc::new(Registries::new(10, 10));
        let recorder = Arc::new(Recorder::default());
        registries.bus.subscribe(recorder.clone());
        let dispatcher = Dispatcher::standard(registries.clone());

        let report = replay_files(&dispatcher, &[first, second.clone()]);

        assert_eq!(report.files, 2);
        assert_eq!(report.lines, 2);
        assert_eq!(report.skipped, 1);
        let handoff = report.handoff.expect("handoff");
        assert_eq!(handoff.path, second);
        assert_eq!(handoff.offset, second_body.find('\n').expect("newline") as u64 + 1);

        assert_eq!(registries.commander.current_system().as_deref(), Some("Lave"));
        assert_eq!(recorder.taken(), vec![RegistryChange::BatchCompleted]);
    }

    #[test]
    fn unreadable_file_is_skipped() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("Journal.2024-03-01T100000.01.log");
        let dispatcher = Dispatcher::standard(Arc::new(Registries::new(10, 10)));

        let report = replay_files(&dispatcher, &[missing]);
        assert_eq!(report.files, 0);
        assert!(report.handoff.is_none());
        assert!(!dispatcher.registries().bus.is_batch_loading());
    }
}
