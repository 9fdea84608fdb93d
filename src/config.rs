//! Runtime configuration.
//!
//! Settings are resolved once at startup from three layers: command line flags, an
//! optional TOML file, and built-in defaults. The resulting [`CatalogConfig`] is handed
//! to the [`ConfigGate`](crate::gate::ConfigGate), which becomes its only writer.

use crate::error::{Result, RltailError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TAIL_DEPTH: usize = 200;
pub const DEFAULT_MAX_FILTER_LINES: usize = 100_000;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;

/// Configuration shared by the catalog, poller and filter engine.
///
/// Instances are immutable once published; a tail depth change produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogConfig {
    /// Directory scanned once at startup
    pub root_path: PathBuf,
    /// Number of trailing lines kept per file snapshot
    pub tail_depth: usize,
    /// Upper bound on lines scanned by a single filter request
    pub max_filter_lines: usize,
    /// Seconds between poll cycles
    pub poll_interval_secs: u64,
}

impl CatalogConfig {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            tail_depth: DEFAULT_TAIL_DEPTH,
            max_filter_lines: DEFAULT_MAX_FILTER_LINES,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Copy of this configuration with a different tail depth.
    pub fn with_tail_depth(&self, tail_depth: usize) -> Result<Self> {
        validate_tail_depth(tail_depth)?;
        Ok(Self {
            tail_depth,
            ..self.clone()
        })
    }

    pub fn validate(&self) -> Result<()> {
        validate_tail_depth(self.tail_depth).map_err(|e| RltailError::config(e.to_string()))?;
        if self.max_filter_lines == 0 {
            return Err(RltailError::config("max filter lines must be at least 1"));
        }
        if self.poll_interval_secs == 0 {
            return Err(RltailError::config("poll interval must be at least 1 second"));
        }
        Ok(())
    }
}

/// Reject tail depths that would produce an empty snapshot.
pub fn validate_tail_depth(tail_depth: usize) -> Result<()> {
    if tail_depth == 0 {
        return Err(RltailError::invalid_value("tail depth must be at least 1"));
    }
    Ok(())
}

/// Address the HTTP surface binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Fully resolved settings for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub catalog: CatalogConfig,
    pub server: ServerConfig,
}

/// Values that may appear in a TOML configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    pub catalog: CatalogSection,
    pub server: ServerSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogSection {
    pub root_path: Option<PathBuf>,
    pub tail_depth: Option<usize>,
    pub max_filter_lines: Option<usize>,
    pub poll_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl SettingsFile {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| RltailError::config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RltailError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// `<config dir>/rltail/config.toml`, if the platform has a config dir.
    pub fn default_location() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rltail").join("config.toml"))
    }
}

/// Command line values; `None` means the flag was not given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub root_path: Option<PathBuf>,
    pub tail_depth: Option<usize>,
    pub max_filter_lines: Option<usize>,
    pub poll_interval_secs: Option<u64>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Settings {
    /// Merge flags over the file over defaults, then validate.
    pub fn resolve(file: SettingsFile, overrides: SettingsOverrides) -> Result<Self> {
        let root_path = overrides
            .root_path
            .or(file.catalog.root_path)
            .ok_or_else(|| RltailError::config("no log directory given (use --path)"))?;

        let catalog = CatalogConfig {
            root_path,
            tail_depth: overrides
                .tail_depth
                .or(file.catalog.tail_depth)
                .unwrap_or(DEFAULT_TAIL_DEPTH),
            max_filter_lines: overrides
                .max_filter_lines
                .or(file.catalog.max_filter_lines)
                .unwrap_or(DEFAULT_MAX_FILTER_LINES),
            poll_interval_secs: overrides
                .poll_interval_secs
                .or(file.catalog.poll_interval_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        };
        catalog.validate()?;

        let server = ServerConfig {
            host: overrides
                .host
                .or(file.server.host)
                .filter(|host| !host.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides.port.or(file.server.port).unwrap_or(DEFAULT_PORT),
        };

        Ok(Self { catalog, server })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_when_nothing_given() {
        let overrides = SettingsOverrides {
            root_path: Some(PathBuf::from("/var/log")),
            ..Default::default()
        };
        let settings = Settings::resolve(SettingsFile::default(), overrides).unwrap();

        assert_eq!(settings.catalog, CatalogConfig::new("/var/log"));
        assert_eq!(settings.server, ServerConfig::default());
        assert_eq!(settings.catalog.poll_interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_flags_override_file() {
        let file = SettingsFile::from_toml_str(
            r#"
            [catalog]
            root_path = "/srv/logs"
            tail_depth = 50
            poll_interval_secs = 2

            [server]
            port = 9000
            "#,
        )
        .unwrap();
        let overrides = SettingsOverrides {
            tail_depth: Some(10),
            host: Some("0.0.0.0".to_string()),
            ..Default::default()
        };

        let settings = Settings::resolve(file, overrides).unwrap();
        assert_eq!(settings.catalog.root_path, PathBuf::from("/srv/logs"));
        assert_eq!(settings.catalog.tail_depth, 10);
        assert_eq!(settings.catalog.poll_interval_secs, 2);
        assert_eq!(settings.catalog.max_filter_lines, DEFAULT_MAX_FILTER_LINES);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9000);
    }

    #[test]
    fn test_missing_root_is_config_error() {
        let result = Settings::resolve(SettingsFile::default(), SettingsOverrides::default());
        assert!(matches!(result, Err(RltailError::ConfigError { .. })));
    }

    #[test]
    fn test_zero_values_rejected() {
        let overrides = SettingsOverrides {
            root_path: Some(PathBuf::from("/var/log")),
            poll_interval_secs: Some(0),
            ..Default::default()
        };
        let result = Settings::resolve(SettingsFile::default(), overrides);
        assert!(matches!(result, Err(RltailError::ConfigError { .. })));

        let overrides = SettingsOverrides {
            root_path: Some(PathBuf::from("/var/log")),
            tail_depth: Some(0),
            ..Default::default()
        };
        let result = Settings::resolve(SettingsFile::default(), overrides);
        assert!(matches!(result, Err(RltailError::ConfigError { .. })));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = SettingsFile::from_toml_str("[catalog]\ntail_lines = 3\n");
        assert!(matches!(result, Err(RltailError::ConfigError { .. })));
    }

    #[test]
    fn test_with_tail_depth() {
        let config = CatalogConfig::new("/var/log");
        let updated = config.with_tail_depth(3).unwrap();
        assert_eq!(updated.tail_depth, 3);
        assert_eq!(updated.root_path, config.root_path);

        assert!(matches!(
            config.with_tail_depth(0),
            Err(RltailError::InvalidValue { .. })
        ));
    }
}
