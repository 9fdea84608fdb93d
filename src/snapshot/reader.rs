//! Reading file tails and modification times from disk.
//!
//! The [`TailReader`] trait is the seam between the poller and the filesystem, so the
//! refresh state machine can be driven with failing or slow sources in tests.

use crate::error::{Result, RltailError};
use async_trait::async_trait;
use memchr::memrchr;
use std::io::SeekFrom;
use std::path::Path;
use std::time::SystemTime;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Bytes read per backward step while looking for line starts
pub const TAIL_CHUNK_SIZE: usize = 64 * 1024;

/// Source of modification times and tail bytes for catalog files.
///
/// All implementations must be thread-safe.
#[async_trait]
pub trait TailReader: Send + Sync {
    /// Last modification time of the file
    async fn modified(&self, path: &Path) -> Result<SystemTime>;

    /// Raw bytes of the last `max_lines` lines of the file
    ///
    /// A trailing newline does not start an extra (empty) line. Returns an empty
    /// buffer for empty files or when `max_lines` is zero.
    async fn read_tail(&self, path: &Path, max_lines: usize) -> Result<Vec<u8>>;
}

/// [`TailReader`] backed by tokio's filesystem API.
#[derive(Debug, Clone)]
pub struct DiskTailReader {
    chunk_size: usize,
}

impl Default for DiskTailReader {
    fn default() -> Self {
        Self {
            chunk_size: TAIL_CHUNK_SIZE,
        }
    }
}

impl DiskTailReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader stepping backward by `chunk_size` bytes at a time.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Byte offset where the last `max_lines` lines of `file` begin
    async fn tail_start(&self, file: &mut File, len: u64, max_lines: usize) -> Result<u64> {
        if len == 0 || max_lines == 0 {
            return Ok(len);
        }

        let mut chunk = vec![0u8; self.chunk_size];
        let mut pos = len;
        let mut newlines_seen = 0usize;
        let mut at_eof = true;

        while pos > 0 {
            let chunk_start = pos.saturating_sub(self.chunk_size as u64);
            let chunk_len = (pos - chunk_start) as usize;
            file.seek(SeekFrom::Start(chunk_start)).await?;
            file.read_exact(&mut chunk[..chunk_len]).await?;

            let mut search_end = chunk_len;
            if at_eof {
                // Trailing newline terminates the last line, it doesn't separate one
                if chunk[chunk_len - 1] == b'\n' {
                    search_end -= 1;
                }
                at_eof = false;
            }

            while let Some(newline_pos) = memrchr(b'\n', &chunk[..search_end]) {
                newlines_seen += 1;
                if newlines_seen == max_lines {
                    return Ok(chunk_start + newline_pos as u64 + 1);
                }
                search_end = newline_pos;
            }

            pos = chunk_start;
        }

        Ok(0)
    }
}

#[async_trait]
impl TailReader for DiskTailReader {
    async fn modified(&self, path: &Path) -> Result<SystemTime> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            RltailError::file_error(format!("Failed to stat {}", path.display()), e)
        })?;
        metadata
            .modified()
            .map_err(|e| RltailError::file_error("Modification time unavailable", e))
    }

    async fn read_tail(&self, path: &Path, max_lines: usize) -> Result<Vec<u8>> {
        let mut file = File::open(path).await.map_err(|e| {
            RltailError::file_error(format!("Failed to open {}", path.display()), e)
        })?;
        let len = file
            .metadata()
            .await
            .map_err(|e| RltailError::file_error("Failed to get file metadata", e))?
            .len();

        let start = self.tail_start(&mut file, len, max_lines).await?;

        // Stop at the length seen above so appends during the read can't add lines
        file.seek(SeekFrom::Start(start)).await?;
        let mut tail = Vec::with_capacity((len - start) as usize);
        file.take(len - start)
            .read_to_end(&mut tail)
            .await
            .map_err(|e| RltailError::file_error("Failed to read file tail", e))?;

        Ok(tail)
    }
}
