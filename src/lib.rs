//! # rltail - Compressed Log Tails over HTTP
//!
//! Watches a directory of log files and keeps the last N lines of each one in memory,
//! zstd-compressed, refreshing them on a fixed interval. Clients read the cached tails,
//! run substring filters against the live files, and change the tail depth at runtime.
//!
//! ## Architecture
//!
//! - [`catalog`] - Discovery of the text files under the root directory
//! - [`snapshot`] - Compressed tail snapshots and the record store
//! - [`poller`] - Background refresh of stale snapshots
//! - [`gate`] - Published configuration and the refresh/mutation exclusion
//! - [`filter`] - Bounded substring scans straight from disk
//! - [`service`] - The operations a serving surface calls
//! - [`http`] - The axum router exposing those operations
//! - [`config`] - Defaults, config file and command line resolution
//! - [`error`] - Centralized error types and handling

pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod gate;
pub mod http;
pub mod poller;
pub mod service;
pub mod snapshot;

// Re-export commonly used types for convenience
pub use error::{Result, RltailError};

pub use catalog::FileCatalog;
pub use config::{CatalogConfig, ServerConfig, Settings};
pub use filter::{FilterEngine, FilterOutcome};
pub use gate::ConfigGate;
pub use poller::{Poller, PollerHandle};
pub use service::LogService;
pub use snapshot::{DiskTailReader, SnapshotStore, TailReader, TailSnapshot};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
