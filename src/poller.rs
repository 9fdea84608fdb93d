//! Background refresh loop.
//!
//! Every cycle probes the modification time of each record. A record is stale when its
//! file changed (in either direction) or when its snapshot was captured at a different
//! tail depth than the one currently published. Stale records are then re-read and
//! recompressed while a shared [`RefreshGuard`](crate::gate::RefreshGuard) pins the
//! depth, so a reconfiguration can never land in the middle of a refresh.
//!
//! A failure on one file is logged and left for the next cycle; it never stops the
//! cycle for the other files and there is no retry limit.

use crate::gate::ConfigGate;
use crate::snapshot::{read_snapshot, LogFileRecord, SnapshotStore, TailReader};
use futures::stream::{self, StreamExt};
use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Maximum number of stale records refreshed concurrently within one cycle
pub const REFRESH_CONCURRENCY: usize = 16;

/// Outcome counters for a single poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Records whose modification time was read
    pub probed: usize,
    /// Records whose snapshot was replaced
    pub refreshed: usize,
    /// Records skipped because a probe or read failed
    pub failed: usize,
}

/// Sole writer of record snapshots.
pub struct Poller {
    store: Arc<SnapshotStore>,
    gate: Arc<ConfigGate>,
    reader: Arc<dyn TailReader>,
    refresh_count: u64,
}

impl Poller {
    pub fn new(
        store: Arc<SnapshotStore>,
        gate: Arc<ConfigGate>,
        reader: Arc<dyn TailReader>,
    ) -> Self {
        Self {
            store,
            gate,
            reader,
            refresh_count: 0,
        }
    }

    /// Total snapshots replaced since this poller was created
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    /// Run one probe-and-refresh cycle over every record.
    pub async fn poll_once(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        let depth = self.gate.snapshot().tail_depth;

        let mut stale: Vec<(Arc<LogFileRecord>, SystemTime)> = Vec::new();
        for record in self.store.records() {
            match self.reader.modified(record.path()).await {
                Ok(modified) => {
                    report.probed += 1;
                    if record.snapshot().is_stale(modified, depth) {
                        stale.push((Arc::clone(record), modified));
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("Probe of {} failed, retrying next cycle: {}", record.path().display(), e);
                }
            }
        }

        if stale.is_empty() {
            return report;
        }

        let guard = self.gate.begin_refresh().await;
        let tail_depth = guard.tail_depth();
        let reader = &self.reader;

        let outcomes: Vec<bool> = stream::iter(stale)
            .map(|(record, modified)| async move {
                match read_snapshot(reader.as_ref(), record.path(), modified, tail_depth).await {
                    Ok(snapshot) => {
                        debug!(
                            "{} changed, refreshed {} compressed bytes at depth {}",
                            record.path().display(),
                            snapshot.compressed_len(),
                            tail_depth
                        );
                        record.publish(snapshot);
                        true
                    }
                    Err(e) => {
                        warn!("Refresh of {} failed, retrying next cycle: {}", record.path().display(), e);
                        false
                    }
                }
            })
            .buffer_unordered(REFRESH_CONCURRENCY)
            .collect()
            .await;
        drop(guard);

        for refreshed in outcomes {
            if refreshed {
                report.refreshed += 1;
            } else {
                report.failed += 1;
            }
        }
        self.refresh_count += report.refreshed as u64;
        report
    }

    /// Run cycles on a background task until the handle is shut down.
    ///
    /// Dropping the returned handle stops the loop as well.
    pub fn spawn(self) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        PollerHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        info!("Poller started for {} records", self.store.len());
        loop {
            let report = self.poll_once().await;
            if report.refreshed > 0 || report.failed > 0 {
                debug!(
                    "Cycle done: {} refreshed, {} failed, {} total refreshes",
                    report.refreshed, report.failed, self.refresh_count
                );
            }

            let interval = self.gate.snapshot().poll_interval();
            trace!("Poller sleeping for {:?}", interval);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => break,
            }
        }
        info!("Poller stopped after {} refreshes", self.refresh_count);
    }
}

/// Handle to a spawned [`Poller`].
pub struct PollerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop the loop after the cycle in progress and wait for it.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("Poller task ended abnormally: {}", e);
        }
    }
}
