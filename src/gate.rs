//! Mutual exclusion between tail depth changes and snapshot refreshes.
//!
//! The gate owns the published [`CatalogConfig`]. Refresh cycles take a shared
//! [`RefreshGuard`], so any number of refreshes run side by side and all see the same
//! depth. A reconfiguration takes the exclusive [`MutationGuard`] without waiting: if a
//! refresh or another reconfiguration is in flight it gets [`RltailError::GateBusy`]
//! immediately. Both guards release the gate when dropped, on every exit path.
//!
//! Readers that only need the current values call [`ConfigGate::snapshot`], which hands
//! out the published `Arc<CatalogConfig>` and never contends with the gate itself.

use crate::config::CatalogConfig;
use crate::error::{Result, RltailError};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{RwLock as GateLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
pub struct ConfigGate {
    /// Last published configuration
    published: RwLock<Arc<CatalogConfig>>,
    /// Shared for refreshes, exclusive for mutations
    gate: GateLock<()>,
}

impl ConfigGate {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            published: RwLock::new(Arc::new(config)),
            gate: GateLock::new(()),
        }
    }

    /// Current configuration, captured by value.
    pub fn snapshot(&self) -> Arc<CatalogConfig> {
        Arc::clone(&self.published.read())
    }

    /// Take the gate exclusively, failing fast if it is held.
    pub fn try_begin_mutation(&self) -> Result<MutationGuard<'_>> {
        let permit = self.gate.try_write().map_err(|_| RltailError::GateBusy)?;
        Ok(MutationGuard {
            published: &self.published,
            _permit: permit,
        })
    }

    /// Take the gate in shared mode for a refresh pass.
    ///
    /// Waits only while a mutation is being applied, which never awaits anything.
    pub async fn begin_refresh(&self) -> RefreshGuard<'_> {
        let permit = self.gate.read().await;
        RefreshGuard {
            config: self.snapshot(),
            _permit: permit,
        }
    }
}

/// Exclusive hold on the gate. Dropping it ends the mutation.
#[derive(Debug)]
pub struct MutationGuard<'a> {
    published: &'a RwLock<Arc<CatalogConfig>>,
    _permit: RwLockWriteGuard<'a, ()>,
}

impl MutationGuard<'_> {
    /// Publish a new tail depth; takes effect on the next refresh cycle.
    pub fn set_tail_depth(&self, tail_depth: usize) -> Result<Arc<CatalogConfig>> {
        let next = Arc::new(self.published.read().with_tail_depth(tail_depth)?);
        *self.published.write() = Arc::clone(&next);
        Ok(next)
    }
}

/// Shared hold on the gate, pinning the configuration for one refresh pass.
#[derive(Debug)]
pub struct RefreshGuard<'a> {
    config: Arc<CatalogConfig>,
    _permit: RwLockReadGuard<'a, ()>,
}

impl RefreshGuard<'_> {
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn tail_depth(&self) -> usize {
        self.config.tail_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> ConfigGate {
        ConfigGate::new(CatalogConfig::new("/var/log"))
    }

    #[test]
    fn test_mutation_publishes_new_depth() {
        let gate = gate();
        let before = gate.snapshot();

        let guard = gate.try_begin_mutation().unwrap();
        let after = guard.set_tail_depth(3).unwrap();
        drop(guard);

        assert_eq!(after.tail_depth, 3);
        assert_eq!(gate.snapshot().tail_depth, 3);
        // Earlier captures keep the value they saw
        assert_eq!(before.tail_depth, crate::config::DEFAULT_TAIL_DEPTH);
    }

    #[test]
    fn test_second_mutation_is_busy() {
        let gate = gate();
        let first = gate.try_begin_mutation().unwrap();

        assert!(matches!(
            gate.try_begin_mutation(),
            Err(RltailError::GateBusy)
        ));

        drop(first);
        assert!(gate.try_begin_mutation().is_ok());
    }

    #[test]
    fn test_invalid_depth_leaves_config_untouched() {
        let gate = gate();
        let guard = gate.try_begin_mutation().unwrap();
        assert!(matches!(
            guard.set_tail_depth(0),
            Err(RltailError::InvalidValue { .. })
        ));
        drop(guard);

        assert_eq!(gate.snapshot().tail_depth, crate::config::DEFAULT_TAIL_DEPTH);
        // Gate released on the error path as well
        assert!(gate.try_begin_mutation().is_ok());
    }

    #[tokio::test]
    async fn test_mutation_busy_while_refresh_in_flight() {
        let gate = gate();
        let refresh = gate.begin_refresh().await;

        assert!(matches!(
            gate.try_begin_mutation(),
            Err(RltailError::GateBusy)
        ));
        assert_eq!(gate.snapshot().tail_depth, refresh.tail_depth());

        drop(refresh);
        let guard = gate.try_begin_mutation().unwrap();
        guard.set_tail_depth(7).unwrap();
    }

    #[tokio::test]
    async fn test_refreshes_share_the_gate() {
        let gate = gate();
        let first = gate.begin_refresh().await;
        let second = gate.begin_refresh().await;
        assert_eq!(first.tail_depth(), second.tail_depth());
    }

    #[tokio::test]
    async fn test_refresh_sees_depth_after_mutation() {
        let gate = Arc::new(gate());
        {
            let guard = gate.try_begin_mutation().unwrap();
            guard.set_tail_depth(12).unwrap();
        }
        let refresh = gate.begin_refresh().await;
        assert_eq!(refresh.tail_depth(), 12);
        assert_eq!(refresh.config().root_path, std::path::PathBuf::from("/var/log"));
    }
}
