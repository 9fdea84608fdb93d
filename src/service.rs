//! The operations offered to a serving surface.
//!
//! [`LogService`] ties the snapshot store, filter engine and configuration gate
//! together. Every method returns a structured `Result`; nothing here panics or
//! terminates the process on a runtime error.

use crate::config::CatalogConfig;
use crate::error::{Result, RltailError};
use crate::filter::{FilterEngine, FilterOutcome};
use crate::gate::ConfigGate;
use crate::snapshot::{LogFileRecord, RecordInfo, SnapshotStore};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

/// Decompressed tail of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotView {
    pub info: RecordInfo,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct LogService {
    store: Arc<SnapshotStore>,
    gate: Arc<ConfigGate>,
    filter: FilterEngine,
}

impl LogService {
    pub fn new(store: Arc<SnapshotStore>, gate: Arc<ConfigGate>) -> Self {
        let filter = FilterEngine::new(Arc::clone(&store));
        Self {
            store,
            gate,
            filter,
        }
    }

    pub fn list_records(&self) -> Vec<RecordInfo> {
        self.store.records().iter().map(|record| record.info()).collect()
    }

    /// Decompressed tail of `path` as of the last poll cycle.
    pub fn get_snapshot(&self, path: &Path) -> Result<SnapshotView> {
        let record = self.record(path)?;
        let snapshot = record.snapshot();
        let data = snapshot.decompress(record.path())?;
        Ok(SnapshotView {
            info: record.info(),
            data,
        })
    }

    /// Filter scan of `path` using the configured line budget.
    pub async fn filter(&self, path: &Path, pattern: &str, reverse: bool) -> Result<FilterOutcome> {
        if pattern.is_empty() {
            return Err(RltailError::invalid_argument("filter pattern must not be empty"));
        }
        self.record(path)?;
        let max_lines = self.gate.snapshot().max_filter_lines;
        self.filter.filter(path, pattern, reverse, max_lines).await
    }

    /// Publish a new tail depth, applied by the poller on its next cycle.
    ///
    /// # Errors
    /// * `GateBusy` while a refresh or another change is in flight (retryable)
    /// * `InvalidValue` for a depth of zero
    pub fn change_tail_depth(&self, tail_depth: usize) -> Result<Arc<CatalogConfig>> {
        let guard = match self.gate.try_begin_mutation() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Tail depth change to {} rejected: {}", tail_depth, e);
                return Err(e);
            }
        };
        let config = guard.set_tail_depth(tail_depth)?;
        info!("Tail depth changed to {}", config.tail_depth);
        Ok(config)
    }

    pub fn current_config(&self) -> Arc<CatalogConfig> {
        self.gate.snapshot()
    }

    fn record(&self, path: &Path) -> Result<&Arc<LogFileRecord>> {
        self.store
            .get(path)
            .ok_or_else(|| RltailError::not_found(path))
    }
}
