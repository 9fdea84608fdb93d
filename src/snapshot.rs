//! In-memory, compressed tail snapshots of the catalog files.
//!
//! Each [`LogFileRecord`] holds an `Arc<TailSnapshot>` that is replaced wholesale on
//! refresh. Readers clone the `Arc` and work on an immutable buffer, so a half-written
//! snapshot is never observable. The poller is the only writer.

pub mod codec;
pub mod reader;

pub use reader::{DiskTailReader, TailReader};

use crate::error::{Result, RltailError};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Immutable tail state of one file as of a modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailSnapshot {
    last_modified: Option<SystemTime>,
    tail_depth: usize,
    compressed: Vec<u8>,
}

impl TailSnapshot {
    /// Placeholder for a file whose first read failed; always stale.
    pub fn empty() -> Self {
        Self {
            last_modified: None,
            tail_depth: 0,
            compressed: Vec::new(),
        }
    }

    /// Compress `raw` tail bytes read at `tail_depth` as of `last_modified`.
    pub fn capture(raw: &[u8], last_modified: SystemTime, tail_depth: usize) -> Result<Self> {
        let compressed = codec::compress(raw)
            .map_err(|e| RltailError::file_error("Failed to compress tail", e))?;
        Ok(Self {
            last_modified: Some(last_modified),
            tail_depth,
            compressed,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        last_modified: Option<SystemTime>,
        tail_depth: usize,
        compressed: Vec<u8>,
    ) -> Self {
        Self {
            last_modified,
            tail_depth,
            compressed,
        }
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Depth the buffer was captured with
    pub fn tail_depth(&self) -> usize {
        self.tail_depth
    }

    pub fn compressed_len(&self) -> usize {
        self.compressed.len()
    }

    /// True when the file changed on disk or was captured at another depth.
    pub fn is_stale(&self, modified: SystemTime, tail_depth: usize) -> bool {
        self.last_modified != Some(modified) || self.tail_depth != tail_depth
    }

    /// Decompressed tail bytes. `path` is only used for error context.
    pub fn decompress(&self, path: &Path) -> Result<Vec<u8>> {
        if self.compressed.is_empty() {
            return Ok(Vec::new());
        }
        codec::decompress(&self.compressed).map_err(|source| RltailError::DecompressionFailure {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Read and compress a fresh snapshot of `path` as of `modified`.
pub async fn read_snapshot(
    reader: &dyn TailReader,
    path: &Path,
    modified: SystemTime,
    tail_depth: usize,
) -> Result<TailSnapshot> {
    let raw = reader.read_tail(path, tail_depth).await?;
    TailSnapshot::capture(&raw, modified, tail_depth)
}

/// One catalog file and its current snapshot.
#[derive(Debug)]
pub struct LogFileRecord {
    path: PathBuf,
    display_name: String,
    snapshot: RwLock<Arc<TailSnapshot>>,
}

impl LogFileRecord {
    pub fn new(path: PathBuf, snapshot: TailSnapshot) -> Self {
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            path,
            display_name,
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Current snapshot; stays valid even if a refresh replaces it meanwhile.
    pub fn snapshot(&self) -> Arc<TailSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub(crate) fn publish(&self, snapshot: TailSnapshot) {
        *self.snapshot.write() = Arc::new(snapshot);
    }

    pub fn info(&self) -> RecordInfo {
        RecordInfo {
            path: self.path.clone(),
            name: self.display_name.clone(),
            last_modified: self.snapshot().last_modified().map(unix_nanos),
        }
    }
}

/// Metadata view of a record for enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordInfo {
    pub path: PathBuf,
    pub name: String,
    /// Nanoseconds since the Unix epoch, absent until the first successful read
    #[serde(rename = "Timestamp")]
    pub last_modified: Option<i64>,
}

/// Nanoseconds since the Unix epoch, negative for earlier times.
pub fn unix_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_nanos())
            .map(|nanos| -nanos)
            .unwrap_or(i64::MIN),
    }
}

/// Ordered records, indexed by path.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    records: Vec<Arc<LogFileRecord>>,
    index: HashMap<PathBuf, usize>,
}

impl SnapshotStore {
    pub fn new(records: Vec<LogFileRecord>) -> Self {
        let records: Vec<Arc<LogFileRecord>> = records.into_iter().map(Arc::new).collect();
        let index = records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.path.clone(), position))
            .collect();
        Self { records, index }
    }

    pub fn records(&self) -> &[Arc<LogFileRecord>] {
        &self.records
    }

    pub fn get(&self, path: &Path) -> Option<&Arc<LogFileRecord>> {
        self.index.get(path).map(|&position| &self.records[position])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_capture_and_decompress() {
        let snapshot = TailSnapshot::capture(b"C\nD\nE\n", at(10), 3).unwrap();
        assert_eq!(snapshot.last_modified(), Some(at(10)));
        assert_eq!(snapshot.tail_depth(), 3);
        assert_eq!(
            snapshot.decompress(Path::new("/logs/app.log")).unwrap(),
            b"C\nD\nE\n"
        );
    }

    #[test]
    fn test_staleness() {
        let snapshot = TailSnapshot::capture(b"x\n", at(10), 3).unwrap();
        assert!(!snapshot.is_stale(at(10), 3));
        assert!(snapshot.is_stale(at(11), 3));
        // Rolled back in time still counts as changed
        assert!(snapshot.is_stale(at(9), 3));
        assert!(snapshot.is_stale(at(10), 4));
        assert!(TailSnapshot::empty().is_stale(at(10), 3));
    }

    #[test]
    fn test_corrupt_buffer_reports_decompression_failure() {
        let snapshot = TailSnapshot::from_parts(Some(at(1)), 3, b"garbage".to_vec());
        match snapshot.decompress(Path::new("/logs/app.log")) {
            Err(RltailError::DecompressionFailure { path, .. }) => {
                assert_eq!(path, PathBuf::from("/logs/app.log"));
            }
            other => panic!("expected DecompressionFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_snapshot_decompresses_to_nothing() {
        assert!(TailSnapshot::empty()
            .decompress(Path::new("/logs/app.log"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_readers_keep_old_snapshot_across_publish() {
        let record = LogFileRecord::new(
            PathBuf::from("/logs/app.log"),
            TailSnapshot::capture(b"old\n", at(1), 1).unwrap(),
        );
        let held = record.snapshot();

        record.publish(TailSnapshot::capture(b"new\n", at(2), 1).unwrap());

        assert_eq!(held.decompress(record.path()).unwrap(), b"old\n");
        assert_eq!(record.snapshot().decompress(record.path()).unwrap(), b"new\n");
    }

    #[test]
    fn test_store_lookup_and_order() {
        let store = SnapshotStore::new(vec![
            LogFileRecord::new(PathBuf::from("/logs/b.log"), TailSnapshot::empty()),
            LogFileRecord::new(PathBuf::from("/logs/a.log"), TailSnapshot::empty()),
        ]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].display_name(), "b.log");
        assert_eq!(
            store.get(Path::new("/logs/a.log")).unwrap().display_name(),
            "a.log"
        );
        assert!(store.get(Path::new("/logs/c.log")).is_none());
    }

    #[test]
    fn test_record_info() {
        let record = LogFileRecord::new(
            PathBuf::from("/logs/app.log"),
            TailSnapshot::capture(b"x\n", at(2), 1).unwrap(),
        );
        let info = record.info();
        assert_eq!(info.name, "app.log");
        assert_eq!(info.last_modified, Some(2_000_000_000));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["Name"], "app.log");
        assert_eq!(json["Path"], "/logs/app.log");
        assert_eq!(json["Timestamp"], 2_000_000_000i64);
    }
}
