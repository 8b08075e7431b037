//! Console configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then CLI flags
//! and environment variables (applied by `cli::build_config`).

use crate::error::{ConsoleError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub stats_refresh_interval: Duration,
    pub history_limit: u32,
    pub user_agent: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            stats_refresh_interval: Duration::from_secs(5 * 60),
            history_limit: 10,
            user_agent: format!("adrank-console/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ConsoleConfig {
    /// Load from an explicit path, or from the default location when it exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let cfg: ConsoleConfig = serde_json::from_str(&raw).map_err(|e| {
            ConsoleError::Config(format!("cannot parse {}: {e}", path.display()))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.base_url)
            .map_err(|e| ConsoleError::Config(format!("base_url {:?}: {e}", self.base_url)))?;
        if self.poll_interval.is_zero() {
            return Err(ConsoleError::Config(
                "poll_interval must be greater than zero".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConsoleError::Config(
                "request_timeout must be greater than zero".into(),
            ));
        }
        if self.stats_refresh_interval.is_zero() {
            return Err(ConsoleError::Config(
                "stats_refresh_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// `<config dir>/adrank-console/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("adrank-console").join("config.json"))
}
