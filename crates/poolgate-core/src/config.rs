//! poolgate.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::{
    DEFAULT_BASE_PORT, DEFAULT_LISTEN_PORT, DEFAULT_REJECT_STATUS, DEFAULT_SCALE_INTERVAL_SECS,
    DEFAULT_WORKER_PROGRAM,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolgateConfig {
    pub listen: ListenConfig,
    pub workers: WorkerConfig,
    pub scaling: ScalingConfig,
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_LISTEN_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Executable spawned for every worker. The port is appended as the
    /// last argument.
    pub program: String,
    pub args: Vec<String>,
    pub base_port: u16,
    /// Optional cap below the host's logical CPU count.
    pub max_workers: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_WORKER_PROGRAM.to_string(),
            args: Vec::new(),
            base_port: DEFAULT_BASE_PORT,
            max_workers: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub interval: String,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            interval: format!("{DEFAULT_SCALE_INTERVAL_SECS}s"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub reject_status: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            reject_status: DEFAULT_REJECT_STATUS,
        }
    }
}

impl PoolgateConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: PoolgateConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot reject on its own.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(100..=599).contains(&self.proxy.reject_status) {
            return Err(ConfigError::InvalidStatus(self.proxy.reject_status));
        }
        if self.scaling_interval().is_zero() {
            return Err(ConfigError::InvalidInterval(self.scaling.interval.clone()));
        }
        Ok(())
    }

    pub fn scaling_interval(&self) -> Duration {
        parse_duration(&self.scaling.interval)
    }
}

/// Parse a duration string like "5s", "2m" or "7" (seconds).
///
/// Unparseable input falls back to the default tick interval.
pub fn parse_duration(s: &str) -> Duration {
    let s = s.trim();
    let fallback = DEFAULT_SCALE_INTERVAL_SECS;
    let secs = if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().unwrap_or(fallback)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().map(|m| m * 60).unwrap_or(fallback)
    } else {
        s.parse::<u64>().unwrap_or(fallback)
    };
    Duration::from_secs(secs)
}
