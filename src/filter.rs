//! On-demand substring filtering straight from disk.
//!
//! A filter scan bypasses the cached snapshots: it opens the file, reads it from the
//! first line towards the end, and stops after `max_lines` lines. Its cost is bounded
//! by that line budget rather than by the file size. Lines longer than
//! [`MAX_LINE_BYTES`] are truncated for matching and output, and the remainder is
//! skipped without being buffered.

use crate::error::{Result, RltailError};
use crate::snapshot::SnapshotStore;
use bstr::ByteSlice;
use log::debug;
use memchr::memchr;
use memchr::memmem::Finder;
use serde::Serialize;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Longest prefix of a single line kept in memory during a scan
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Result of one filter scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FilterOutcome {
    /// Selected lines in file order, without line terminators
    pub lines: Vec<String>,
    /// Lines examined before the scan stopped
    pub lines_scanned: usize,
    /// True when the line budget ran out before the end of the file
    pub budget_exhausted: bool,
}

impl FilterOutcome {
    /// Lines joined with `\n`, newline-terminated
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// Filter scans over the files known to a [`SnapshotStore`].
#[derive(Debug, Clone)]
pub struct FilterEngine {
    store: Arc<SnapshotStore>,
}

impl FilterEngine {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }

    /// Lines of the catalog file `path` that contain `pattern`, or that don't when
    /// `reverse` is set, looking at no more than `max_lines` lines.
    ///
    /// A path outside the catalog yields an empty outcome rather than an error.
    pub async fn filter(
        &self,
        path: &Path,
        pattern: &str,
        reverse: bool,
        max_lines: usize,
    ) -> Result<FilterOutcome> {
        match self.store.get(path) {
            Some(record) => scan_file(record.path(), pattern, reverse, max_lines).await,
            None => {
                debug!("Filter on unknown file {}", path.display());
                Ok(FilterOutcome::default())
            }
        }
    }
}

/// Scan `path` head to tail, keeping lines whose match state differs from `reverse`.
pub async fn scan_file(
    path: &Path,
    pattern: &str,
    reverse: bool,
    max_lines: usize,
) -> Result<FilterOutcome> {
    let file = File::open(path).await.map_err(|e| {
        RltailError::file_error(format!("Failed to open {}", path.display()), e)
    })?;
    let outcome = scan_lines(
        BufReader::new(file),
        pattern,
        reverse,
        max_lines,
        MAX_LINE_BYTES,
    )
    .await
    .map_err(|e| RltailError::file_error("Failed to read file", e))?;

    debug!(
        "Filtered {} lines of {}, {} selected",
        outcome.lines_scanned,
        path.display(),
        outcome.lines.len()
    );
    Ok(outcome)
}

async fn scan_lines<R: AsyncBufRead + Unpin>(
    mut reader: R,
    pattern: &str,
    reverse: bool,
    max_lines: usize,
    line_cap: usize,
) -> io::Result<FilterOutcome> {
    let finder = Finder::new(pattern.as_bytes());
    let mut outcome = FilterOutcome::default();
    let mut buf = Vec::new();

    while outcome.lines_scanned < max_lines {
        buf.clear();
        if read_line_capped(&mut reader, &mut buf, line_cap).await? == 0 {
            return Ok(outcome);
        }
        outcome.lines_scanned += 1;

        let line = buf.trim_end_with(|c| c == '\n' || c == '\r');
        if finder.find(line).is_some() != reverse {
            outcome.lines.push(line.to_str_lossy().into_owned());
        }
    }

    outcome.budget_exhausted = !reader.fill_buf().await?.is_empty();
    Ok(outcome)
}

/// Consume one line, appending at most `cap` of its bytes to `line`.
///
/// Returns the number of bytes consumed, 0 at EOF.
async fn read_line_capped<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    line: &mut Vec<u8>,
    cap: usize,
) -> io::Result<usize> {
    let mut consumed = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(consumed);
        }
        let (used, done) = match memchr(b'\n', available) {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };
        let room = cap.saturating_sub(line.len());
        line.extend_from_slice(&available[..used.min(room)]);
        reader.consume(used);
        consumed += used;
        if done {
            return Ok(consumed);
        }
    }
}
