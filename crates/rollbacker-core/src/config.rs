//! Supervisor configuration.
//!
//! The defaults reproduce the fixed parameters the supervisor has always
//! run with. A `rollbacker.toml` file may override any of them, and the
//! daemon's command-line flags override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ContainerIdentity, PortMapping};

pub const DEFAULT_CONTAINER_NAME: &str = "my_app";
pub const DEFAULT_HEALTH_URL: &str = "http://localhost:5000/health";
pub const DEFAULT_STATE_FILE: &str = "good_images.json";
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_HOST_PORT: u16 = 5000;
pub const DEFAULT_CONTAINER_PORT: u16 = 5000;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// On-disk configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub container_name: Option<String>,
    pub health_url: Option<String>,
    pub state_file: Option<PathBuf>,
    /// Poll interval, e.g. `"10s"`.
    pub check_interval: Option<String>,
    /// Health probe timeout, e.g. `"3s"` or `"500ms"`.
    pub probe_timeout: Option<String>,
    pub host_port: Option<u16>,
    pub container_port: Option<u16>,
    /// TCP endpoint of the container runtime, e.g. `tcp://127.0.0.1:2375`.
    pub docker_host: Option<String>,
}

impl ConfigFile {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Fully resolved supervisor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    pub container: ContainerIdentity,
    pub health_url: String,
    pub state_file: PathBuf,
    pub check_interval: Duration,
    pub probe_timeout: Duration,
    pub ports: PortMapping,
    pub docker_host: Option<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            container: ContainerIdentity::new(DEFAULT_CONTAINER_NAME),
            health_url: DEFAULT_HEALTH_URL.to_string(),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            check_interval: DEFAULT_CHECK_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            ports: PortMapping::new(DEFAULT_HOST_PORT, DEFAULT_CONTAINER_PORT),
            docker_host: None,
        }
    }
}

impl SupervisorConfig {
    /// Layer a config file over the defaults and validate the result.
    pub fn resolve(file: ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let check_interval = match file.check_interval {
            Some(value) => duration_field("check_interval", value)?,
            None => defaults.check_interval,
        };
        let probe_timeout = match file.probe_timeout {
            Some(value) => duration_field("probe_timeout", value)?,
            None => defaults.probe_timeout,
        };

        let config = Self {
            container: file
                .container_name
                .map(ContainerIdentity::new)
                .unwrap_or(defaults.container),
            health_url: file.health_url.unwrap_or(defaults.health_url),
            state_file: file.state_file.unwrap_or(defaults.state_file),
            check_interval,
            probe_timeout,
            ports: PortMapping::new(
                file.host_port.unwrap_or(defaults.ports.host_port),
                file.container_port.unwrap_or(defaults.ports.container_port),
            ),
            docker_host: file.docker_host.filter(|h| !h.trim().is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the supervisor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container.as_str().trim().is_empty() {
            return Err(ConfigError::Invalid("container name is empty".into()));
        }
        if self.check_interval.is_zero() {
            return Err(ConfigError::Invalid("check interval must be non-zero".into()));
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::Invalid("probe timeout must be non-zero".into()));
        }

        let uri: http::Uri = self
            .health_url
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("health url {:?}: {e}", self.health_url)))?;
        if uri.scheme_str() != Some("http") || uri.authority().is_none() {
            return Err(ConfigError::Invalid(format!(
                "health url must be an absolute http:// url, got {:?}",
                self.health_url
            )));
        }

        Ok(())
    }
}

fn duration_field(field: &'static str, value: String) -> Result<Duration, ConfigError> {
    parse_duration(&value).ok_or(ConfigError::InvalidDuration { field, value })
}

/// Parse a duration string like "5s", "500ms", "1m". A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
