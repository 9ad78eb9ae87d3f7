//! Runway configuration
//!
//! Resolution order, last wins:
//! 1. Built-in defaults (`config/runway.toml`, embedded at compile time)
//! 2. The config file: an explicit path, else `<config dir>/runway/config.toml`
//! 3. Environment overrides (`RUNWAY_DB`, `RUNWAY_OWNER`,
//!    `RUNWAY_AUTO_CLOSE_MINUTES`, `RUNWAY_INDICATOR_SOURCE`)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Default configuration (embedded at compile time)
const DEFAULT_CONFIG: &str = include_str!("../../../config/runway.toml");

/// Database file used when neither config nor environment names one
pub const DEFAULT_DB_PATH: &str = "runway.db";

/// Where consolidated indicators take their ledger buckets from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorSource {
    /// Sum the month's ledger entries in-process
    #[default]
    Local,
    /// Use the store's `period_totals` aggregate, falling back to local
    Store,
}

impl std::str::FromStr for IndicatorSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "store" => Ok(Self::Store),
            _ => Err(format!("Unknown indicator source: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub encrypt: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            encrypt: true,
        }
    }
}

/// Knobs the engine itself reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub include_virtual_card_charges: bool,
    pub indicator_source: IndicatorSource,
    pub cache_indicators: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            include_virtual_card_charges: true,
            indicator_source: IndicatorSource::Local,
            cache_indicators: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 0 disables the auto-close sweep
    pub auto_close_interval_minutes: u64,
    /// Owners the sweep visits; empty means just the configured owner
    pub owners: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            auto_close_interval_minutes: 60,
            owners: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunwayConfig {
    pub owner: String,
    pub database: DatabaseConfig,
    pub engine: EngineSettings,
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for RunwayConfig {
    fn default() -> Self {
        Self {
            owner: "default".to_string(),
            database: DatabaseConfig::default(),
            engine: EngineSettings::default(),
            server: ServerConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Default config file location (`~/.config/runway/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("runway").join("config.toml"))
}

impl RunwayConfig {
    /// Load from the given file (or the default location) and apply
    /// environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::parse(DEFAULT_CONFIG)?;

        let file = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(Error::Config(format!(
                        "config file not found: {}",
                        p.display()
                    )));
                }
                Some(p.to_path_buf())
            }
            None => default_config_path().filter(|p| p.exists()),
        };

        if let Some(file) = file {
            debug!(path = %file.display(), "Loading config file");
            let content = fs::read_to_string(&file).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", file.display(), e))
            })?;
            config = Self::parse(&content)?;
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse TOML; missing keys take their defaults
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
    }

    /// Apply `RUNWAY_*` overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("RUNWAY_DB").filter(|s| !s.is_empty()) {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(owner) = lookup("RUNWAY_OWNER").filter(|s| !s.is_empty()) {
            self.owner = owner;
        }
        if let Some(minutes) = lookup("RUNWAY_AUTO_CLOSE_MINUTES") {
            match minutes.parse() {
                Ok(m) => self.scheduler.auto_close_interval_minutes = m,
                Err(_) => warn!(value = %minutes, "Ignoring invalid RUNWAY_AUTO_CLOSE_MINUTES"),
            }
        }
        if let Some(source) = lookup("RUNWAY_INDICATOR_SOURCE") {
            match source.parse() {
                Ok(s) => self.engine.indicator_source = s,
                Err(e) => warn!(error = %e, "Ignoring invalid RUNWAY_INDICATOR_SOURCE"),
            }
        }
    }

    /// Database path, falling back to `runway.db`
    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_default_config() {
        let config = RunwayConfig::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.owner, "default");
        assert!(config.database.encrypt);
        assert!(config.engine.include_virtual_card_charges);
        assert_eq!(config.engine.indicator_source, IndicatorSource::Local);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.scheduler.auto_close_interval_minutes, 60);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = RunwayConfig::parse(
            r#"
            owner = "acme"
            [engine]
            indicator_source = "store"
            "#,
        )
        .unwrap();
        assert_eq!(config.owner, "acme");
        assert_eq!(config.engine.indicator_source, IndicatorSource::Store);
        assert!(config.engine.cache_indicators);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = RunwayConfig::parse("owner = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RUNWAY_DB", "/tmp/other.db"),
            ("RUNWAY_OWNER", "bob"),
            ("RUNWAY_AUTO_CLOSE_MINUTES", "0"),
            ("RUNWAY_INDICATOR_SOURCE", "store"),
        ]
        .into_iter()
        .collect();

        let mut config = RunwayConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.db_path(), PathBuf::from("/tmp/other.db"));
        assert_eq!(config.owner, "bob");
        assert_eq!(config.scheduler.auto_close_interval_minutes, 0);
        assert_eq!(config.engine.indicator_source, IndicatorSource::Store);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let mut config = RunwayConfig::default();
        config.apply_env(|k| match k {
            "RUNWAY_AUTO_CLOSE_MINUTES" => Some("soon".to_string()),
            "RUNWAY_INDICATOR_SOURCE" => Some("cloud".to_string()),
            _ => None,
        });
        assert_eq!(config.scheduler.auto_close_interval_minutes, 60);
        assert_eq!(config.engine.indicator_source, IndicatorSource::Local);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runway.toml");
        fs::write(&path, "owner = \"carol\"\n[server]\nport = 8080\n").unwrap();

        let config = RunwayConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 8080);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            RunwayConfig::load(Some(&missing)),
            Err(Error::Config(_))
        ));
    }
}
