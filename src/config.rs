// ⚙️ Configuration - JSON file + environment overrides

use crate::report::DEFAULT_REPORT_LIMIT;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Names a config file to load instead of the default location
pub const CONFIG_ENV: &str = "SCOREKEEPER_CONFIG";
pub const DATA_ENV: &str = "SCOREKEEPER_DATA";
pub const ADDR_ENV: &str = "SCOREKEEPER_ADDR";
pub const BROADCAST_ENV: &str = "SCOREKEEPER_BROADCAST_LOG";

pub const DEFAULT_CONFIG_FILE: &str = "scorekeeper.config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// State file; `.db`/`.sqlite`/`.sqlite3` selects SQLite, else JSON
    pub data_path: PathBuf,

    /// Rounds shown by the report
    pub report_limit: usize,

    /// File that receives every finalized round
    pub broadcast_log: Option<PathBuf>,

    /// Also push finalized rounds to the log
    pub broadcast_to_log: bool,

    pub server_addr: String,

    /// Fallback filter when RUST_LOG is unset
    pub log_level: String,

    /// Log destination for the terminal console
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_path: PathBuf::from("scorekeeper.json"),
            report_limit: DEFAULT_REPORT_LIMIT,
            broadcast_log: None,
            broadcast_to_log: false,
            server_addr: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Config {
    /// `$SCOREKEEPER_CONFIG`, else `scorekeeper.config.json` if present, else
    /// defaults; environment overrides applied last
    pub fn load() -> Result<Self> {
        let mut config = match env::var_os(CONFIG_ENV) {
            Some(path) => Config::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Config::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };

        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load config from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(data) = lookup(DATA_ENV).filter(|v| !v.is_empty()) {
            self.data_path = PathBuf::from(data);
        }
        if let Some(addr) = lookup(ADDR_ENV).filter(|v| !v.is_empty()) {
            self.server_addr = addr;
        }
        if let Some(broadcast) = lookup(BROADCAST_ENV).filter(|v| !v.is_empty()) {
            self.broadcast_log = Some(PathBuf::from(broadcast));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.report_limit == 0 {
            bail!("report_limit must be at least 1");
        }
        if self.data_path.as_os_str().is_empty() {
            bail!("data_path must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.report_limit, 3);
        assert_eq!(config.data_path, PathBuf::from("scorekeeper.json"));
        assert!(config.broadcast_log.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"data_path": "state/scores.db", "report_limit": 5}"#).unwrap();

        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.data_path, PathBuf::from("state/scores.db"));
        assert_eq!(config.report_limit, 5);
        assert_eq!(config.server_addr, "0.0.0.0:3000");
    }

    #[test]
    fn test_zero_report_limit_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"report_limit": 0}"#).unwrap();

        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::from_file("/definitely/not/here.json").is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (DATA_ENV, "/var/lib/scores.sqlite"),
            (ADDR_ENV, "127.0.0.1:8080"),
            (BROADCAST_ENV, ""),
        ]);

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.data_path, PathBuf::from("/var/lib/scores.sqlite"));
        assert_eq!(config.server_addr, "127.0.0.1:8080");
        assert!(config.broadcast_log.is_none());
    }
}
