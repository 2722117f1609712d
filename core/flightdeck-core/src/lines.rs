//! Reads complete lines from a growing file.
//!
//! The game appends to the journal while we read it, so the last line in
//! the buffer may be half-written. Only bytes up to the last `\n` count as
//! read; the remainder stays on disk for the next pass.

use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct LineChunk {
    pub lines: Vec<String>,
    /// Offset just after the last consumed newline.
    pub next_offset: u64,
}

/// Reads every complete line at or after `offset`.
pub(crate) fn read_complete_lines(path: &Path, offset: u64) -> io::Result<LineChunk> {
    let mut file = fs_err::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;

    let Some(last_newline) = buffer.iter().rposition(|byte| *byte == b'\n') else {
        return Ok(LineChunk {
            lines: Vec::new(),
            next_offset: offset,
        });
    };

    let lines = buffer[..last_newline]
        .split(|byte| *byte == b'\n')
        .map(|raw| String::from_utf8_lossy(raw).trim_end_matches('\r').to_string())
        .filter(|line| !line.trim().is_empty())
        .collect();

    Ok(LineChunk {
        lines,
        next_offset: offset + last_newline as u64 + 1,
    })
}

pub(crate) fn file_len(path: &Path) -> io::Result<u64> {
    Ok(fs_err::metadata(path)?.len())
}
