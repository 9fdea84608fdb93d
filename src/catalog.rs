//! Startup enumeration of the log directory.
//!
//! [`FileCatalog::discover`] walks the root once and keeps every regular file that
//! sniffs as plain text. [`FileCatalog::populate`] then takes the first snapshot of
//! each file with bounded parallelism and returns the [`SnapshotStore`] the rest of
//! the process works on. Both steps run before any request is served.

pub mod content_type;

use crate::error::{Result, RltailError};
use crate::snapshot::{read_snapshot, LogFileRecord, SnapshotStore, TailReader, TailSnapshot};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Maximum number of files read concurrently while populating
pub const POPULATE_CONCURRENCY: usize = 64;

/// The fixed set of text files found under the root directory.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    root: PathBuf,
    entries: Vec<PathBuf>,
}

impl FileCatalog {
    /// Walk `root` recursively and collect its plain-text files.
    ///
    /// # Errors
    /// * `CatalogUnavailable` if the root is missing, unreadable or not a directory
    /// * `EmptyCatalog` if no eligible file was found
    ///
    /// Non-text files and unreadable entries below the root are skipped with a warning.
    pub fn discover(root: &Path) -> Result<Self> {
        let unavailable = |source: std::io::Error| RltailError::CatalogUnavailable {
            path: root.to_path_buf(),
            source,
        };

        let canonical = std::fs::canonicalize(root).map_err(unavailable)?;
        let metadata = std::fs::metadata(&canonical).map_err(unavailable)?;
        if !metadata.is_dir() {
            return Err(unavailable(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a directory",
            )));
        }
        // Surfaces permission problems on the root itself
        std::fs::read_dir(&canonical).map_err(unavailable)?;

        let mut entries = Vec::new();
        for entry in WalkDir::new(&canonical)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", canonical.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            match content_type::sniff(entry.path()) {
                Ok(kind) if kind.is_text() => entries.push(entry.into_path()),
                Ok(kind) => warn!("Skipping {} ({})", entry.path().display(), kind.name()),
                Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
            }
        }

        if entries.is_empty() {
            return Err(RltailError::EmptyCatalog { path: canonical });
        }

        info!(
            "Found {} text files under {}",
            entries.len(),
            canonical.display()
        );
        Ok(Self {
            root: canonical,
            entries,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute paths of the catalog files, sorted by walk order
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take the first snapshot of every file, at most [`POPULATE_CONCURRENCY`] at once.
    ///
    /// Files that cannot be read get an empty snapshot; the poller retries them.
    /// Returns only after every read has finished, with records in catalog order.
    pub async fn populate(self, reader: &dyn TailReader, tail_depth: usize) -> SnapshotStore {
        let records: Vec<LogFileRecord> = stream::iter(self.entries)
            .map(|path| async move {
                let snapshot = initial_snapshot(reader, &path, tail_depth).await;
                LogFileRecord::new(path, snapshot)
            })
            .buffered(POPULATE_CONCURRENCY)
            .collect()
            .await;

        debug!("Populated {} records at depth {}", records.len(), tail_depth);
        SnapshotStore::new(records)
    }
}

async fn initial_snapshot(reader: &dyn TailReader, path: &Path, tail_depth: usize) -> TailSnapshot {
    let result = match reader.modified(path).await {
        Ok(modified) => read_snapshot(reader, path, modified, tail_depth).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Initial read of {} failed, will retry: {}", path.display(), e);
            TailSnapshot::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::DiskTailReader;
    use async_trait::async_trait;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_discover_skips_binary_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "app.log", b"A\nB\nC\nD\nE\n");
        write(&dir, "binary.dat", &[0x00, 0x01, 0x02, 0xff]);

        let catalog = FileCatalog::discover(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.entries()[0].ends_with("app.log"));
        assert!(catalog.entries()[0].is_absolute());
    }

    #[test]
    fn test_discover_recurses_in_sorted_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "b.log", b"b\n");
        write(&dir, "nested/a.log", b"a\n");
        write(&dir, "a.log", b"a\n");

        let catalog = FileCatalog::discover(dir.path()).unwrap();
        let names: Vec<_> = catalog
            .entries()
            .iter()
            .map(|path| path.strip_prefix(catalog.root()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.log"),
                PathBuf::from("b.log"),
                PathBuf::from("nested/a.log"),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_startup_fatal() {
        let result = FileCatalog::discover(Path::new("/this/dir/does/not/exist"));
        match result {
            Err(e @ RltailError::CatalogUnavailable { .. }) => assert!(e.is_startup_fatal()),
            other => panic!("expected CatalogUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_file_root_is_startup_fatal() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "app.log", b"line\n");
        assert!(matches!(
            FileCatalog::discover(&file),
            Err(RltailError::CatalogUnavailable { .. })
        ));
    }

    #[test]
    fn test_no_text_files_is_startup_fatal() {
        let dir = TempDir::new().unwrap();
        write(&dir, "binary.dat", &[0x00, 0x00]);

        match FileCatalog::discover(dir.path()) {
            Err(e @ RltailError::EmptyCatalog { .. }) => assert!(e.is_startup_fatal()),
            other => panic!("expected EmptyCatalog, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_populate_captures_tails() {
        let dir = TempDir::new().unwrap();
        write(&dir, "app.log", b"A\nB\nC\nD\nE\n");
        write(&dir, "other.log", b"x\n");

        let catalog = FileCatalog::discover(dir.path()).unwrap();
        let store = catalog.populate(&DiskTailReader::new(), 3).await;

        assert_eq!(store.len(), 2);
        let app = &store.records()[0];
        assert_eq!(app.display_name(), "app.log");
        let snapshot = app.snapshot();
        assert_eq!(snapshot.tail_depth(), 3);
        assert!(snapshot.last_modified().is_some());
        assert_eq!(snapshot.decompress(app.path()).unwrap(), b"C\nD\nE\n");
    }

    #[tokio::test]
    async fn test_populate_many_files_keeps_order() {
        let dir = TempDir::new().unwrap();
        for i in 0..(POPULATE_CONCURRENCY * 2 + 3) {
            write(&dir, &format!("file-{i:04}.log"), format!("{i}\n").as_bytes());
        }

        let catalog = FileCatalog::discover(dir.path()).unwrap();
        let expected: Vec<PathBuf> = catalog.entries().to_vec();
        let store = catalog.populate(&DiskTailReader::new(), 10).await;

        let actual: Vec<PathBuf> = store
            .records()
            .iter()
            .map(|record| record.path().to_path_buf())
            .collect();
        assert_eq!(actual, expected);
        for (i, record) in store.records().iter().enumerate() {
            let data = record.snapshot().decompress(record.path()).unwrap();
            assert_eq!(data, format!("{i}\n").as_bytes());
        }
    }

    struct UnreadableReader;

    #[async_trait]
    impl TailReader for UnreadableReader {
        async fn modified(&self, _path: &Path) -> Result<SystemTime> {
            Ok(SystemTime::now())
        }

        async fn read_tail(&self, _path: &Path, _max_lines: usize) -> Result<Vec<u8>> {
            Err(RltailError::file_error(
                "read refused",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            ))
        }
    }

    #[tokio::test]
    async fn test_populate_tolerates_unreadable_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "app.log", b"line\n");

        let catalog = FileCatalog::discover(dir.path()).unwrap();
        let store = catalog.populate(&UnreadableReader, 3).await;

        let snapshot = store.records()[0].snapshot();
        assert_eq!(snapshot.last_modified(), None);
        assert!(snapshot.is_stale(SystemTime::now(), 3));
    }
}
