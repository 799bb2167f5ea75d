//! Controller endpoint configuration.
//!
//! Settings are looked up per key: the YAML config file (`ctrl.yml`
//! by convention) wins, then the matching `BSC_*` environment
//! variable, then a coded default. Only an unreadable or syntactically
//! broken file is an error; a missing file just means env/defaults.

use std::collections::HashMap;
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading the controller configuration. These
/// are the only startup-fatal errors in the system.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("cannot read config file '{path}': {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML.
    #[error("cannot parse config file '{path}': {source}")]
    Yaml {
        /// File path.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A setting has an unusable value (e.g. a non-numeric port).
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue {
        /// Setting key.
        key: String,
        /// The offending value.
        value: String,
    },
}

/// Connection settings for the OpenFlow controller's RESTCONF API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Controller host or IP.
    pub ip: String,
    /// RESTCONF port.
    pub port: u16,
    /// Basic-auth username.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
    /// `http` or `https`.
    pub protocol: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Topology instance to fetch.
    pub topology_id: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            port: 8181,
            username: "admin".to_string(),
            password: "admin".to_string(),
            protocol: "http".to_string(),
            timeout_secs: 5,
            topology_id: "flow:1".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Loads the configuration, merging file, environment and
    /// defaults per key.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let props = match path {
            Some(p) if p.is_file() => {
                let text = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.display().to_string(),
                    source,
                })?;
                serde_yaml::from_str::<HashMap<String, serde_yaml::Value>>(&text).map_err(
                    |source| ConfigError::Yaml {
                        path: p.display().to_string(),
                        source,
                    },
                )?
            }
            Some(p) => {
                debug!(path = %p.display(), "config file not found, using env/defaults");
                HashMap::new()
            }
            None => HashMap::new(),
        };

        let defaults = Self::default();
        let get = |key: &str, default: String| -> String {
            props
                .get(key)
                .and_then(yaml_to_string)
                .or_else(|| env::var(key).ok())
                .unwrap_or(default)
        };

        let port_raw = get("BSC_PORT", defaults.port.to_string());
        let timeout_raw = get("BSC_TIMEOUT", defaults.timeout_secs.to_string());

        Ok(Self {
            ip: get("BSC_IP", defaults.ip),
            port: port_raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "BSC_PORT".to_string(),
                value: port_raw.clone(),
            })?,
            username: get("BSC_USER", defaults.username),
            password: get("BSC_PASSWORD", defaults.password),
            protocol: get("BSC_PROTOCOL", defaults.protocol),
            timeout_secs: timeout_raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "BSC_TIMEOUT".to_string(),
                value: timeout_raw.clone(),
            })?,
            topology_id: get("BSC_TOPOLOGY", defaults.topology_id),
        })
    }

    /// RESTCONF base URL, e.g. `http://127.0.0.1:8181/restconf`.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}/restconf", self.protocol, self.ip, self.port)
    }

    /// Operational datastore URL (read-only controller view).
    pub fn operational_url(&self) -> String {
        format!("{}/operational", self.base_url())
    }

    /// Config datastore URL (where rules are written).
    pub fn config_url(&self) -> String {
        format!("{}/config", self.base_url())
    }
}

fn yaml_to_string(v: &serde_yaml::Value) -> Option<String> {
    match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
