use crate::auth::Credentials;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{error, warn};

pub const CONFIG_ENV: &str = "SYSDASH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "sysdash.yaml";
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DashConfig {
    /// Register this process with `register_to` at startup
    pub agent: bool,
    pub bind_host: String,
    pub port: u16,
    /// Base URL of the master, ex: "http://10.0.0.1:5000"
    pub register_to: Option<String>,
    /// Display name; the machine hostname when unset
    pub register_as: Option<String>,
    /// Host announced to the master instead of the bind address
    pub advertise_host: Option<String>,
    pub auth: Option<Credentials>,
    pub logs: Vec<String>,
    /// Static peers inserted into the registry at startup
    pub nodes: Vec<NodeConf>,
    pub register_interval_secs: Option<u64>,
    pub rpc_timeout_secs: u64,
    pub debug: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NodeConf {
    pub name: Option<String>,
    pub host: String,
    pub port: u16,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            agent: false,
            bind_host: DEFAULT_BIND_HOST.into(),
            port: DEFAULT_PORT,
            register_to: None,
            register_as: None,
            advertise_host: None,
            auth: None,
            logs: Vec::new(),
            nodes: Vec::new(),
            register_interval_secs: None,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
            debug: false,
        }
    }
}

impl DashConfig {
    pub fn from_yaml_str(txt: &str) -> Result<Self, serde_yaml::Error> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(txt)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs.max(1))
    }

    /// `None` disables periodic re-registration
    pub fn register_interval(&self) -> Option<Duration> {
        self.register_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Credentials from SYSDASH_AUTH_USERNAME / SYSDASH_AUTH_PASSWORD, both required
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        match (lookup("SYSDASH_AUTH_USERNAME"), lookup("SYSDASH_AUTH_PASSWORD")) {
            (Some(username), Some(password)) => {
                self.auth = Some(Credentials { username, password });
            }
            (Some(_), None) | (None, Some(_)) => {
                warn!("Ignoring partial credentials from environment: both username and password are required");
            }
            (None, None) => {}
        }
    }
}

pub async fn load_config() -> DashConfig {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    load_config_from(&path).await
}

pub async fn load_config_from(path: impl AsRef<Path>) -> DashConfig {
    let path = path.as_ref();
    if !path.exists() {
        warn!("No config at {}, using defaults", path.display());
        return DashConfig::default();
    }

    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            error!("Cannot read config {}: {}", path.display(), e);
            return DashConfig::default();
        }
    };
    DashConfig::from_yaml_str(&txt).unwrap_or_else(|e| {
        error!("Invalid config {}: {}", path.display(), e);
        DashConfig::default()
    })
}
