//! Server settings read from a YAML file.
//!
//! The file path comes from `VHOSTD_CONFIG` (default `vhostd.yaml`). A
//! missing file means built-in defaults; a file that does not parse is an
//! error. `VHOSTD_PORTS` (comma separated) overrides the listening ports.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::http::parser::DEFAULT_MAX_REQUEST_BYTES;
use crate::routing::class::ResourceClass;

const CONFIG_ENV: &str = "VHOSTD_CONFIG";
const PORTS_ENV: &str = "VHOSTD_PORTS";
const DEFAULT_CONFIG_PATH: &str = "vhostd.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid port list {0:?}")]
    InvalidPorts(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_address: String,
    pub ports: Vec<u16>,
    pub idle_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    pub max_request_bytes: usize,
    pub hosts: Vec<HostConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            ports: vec![80, 8080],
            idle_timeout_secs: 30,
            request_timeout_secs: 10,
            shutdown_grace_secs: 5,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            hosts: vec![HostConfig::named("*")],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub omit_resource_class: bool,
    #[serde(default)]
    pub default_class: ResourceClass,
    #[serde(default = "default_resource")]
    pub default_resource: String,
    /// Directory served beneath the `static` class.
    #[serde(default)]
    pub static_root: Option<PathBuf>,
}

fn default_resource() -> String {
    "index".to_string()
}

impl HostConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            case_sensitive: false,
            omit_resource_class: false,
            default_class: ResourceClass::default(),
            default_resource: default_resource(),
            static_root: None,
        }
    }
}

impl Config {
    /// Loads the file named by `VHOSTD_CONFIG` and applies env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = match Self::from_file(&path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %path, "Configuration file not found, using defaults");
                Self::default()
            }
            other => other?,
        };

        if let Ok(ports) = std::env::var(PORTS_ENV) {
            cfg.ports = parse_ports(&ports)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ports.is_empty() {
            return Err(ConfigError::Invalid("at least one port is required".into()));
        }
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid("idle_timeout_secs must be positive".into()));
        }
        if let Some(host) = self.hosts.iter().find(|h| h.name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("host with empty name: {:?}", host)));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn parse_ports(value: &str) -> Result<Vec<u16>, ConfigError> {
    value
        .split(',')
        .map(|p| p.trim().parse::<u16>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ConfigError::InvalidPorts(value.to_string()))
}
