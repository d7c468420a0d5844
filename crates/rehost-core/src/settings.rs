//! rehost.toml run settings.
//!
//! Every field has a default matching a stock single-control-node
//! install, so an absent file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RehostError, RehostResult};
use crate::hosts::DEFAULT_IGNORE_MARKERS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Host the manager REST API is reached on from this machine.
    pub server_host: String,
    pub properties_path: PathBuf,
    pub hosts_path: PathBuf,
    /// Where the mapping artifact is written before the rename step.
    pub artifact_path: PathBuf,
    /// Value of the `X-Requested-By` header sent with API reads.
    pub requested_by: String,
    /// Limit on each manager API request, in seconds.
    pub api_timeout_secs: u64,
    pub ignore_markers: Vec<String>,
    pub credentials: CredentialsConfig,
    pub commands: CommandsConfig,
    pub ssh: SshConfig,
    pub tls: TlsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Control-node service command (`status`/`start`/`stop`/`update-host-names`).
    pub server: String,
    /// Member agent command (`status`/`start`/`stop`/`reset <server>`).
    pub agent: String,
    pub server_running_marker: String,
    pub agent_running_marker: String,
    /// Per-command timeout in seconds. Zero disables it.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub program: String,
    pub user: Option<String>,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    /// Accept any certificate from the control node (self-signed installs).
    pub insecure: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_host: "localhost".to_string(),
            properties_path: PathBuf::from("/etc/ambari-server/conf/ambari.properties"),
            hosts_path: PathBuf::from("/etc/hosts"),
            artifact_path: PathBuf::from("/tmp/newAmbariHosts.json"),
            requested_by: "ambari".to_string(),
            api_timeout_secs: 30,
            ignore_markers: DEFAULT_IGNORE_MARKERS.iter().map(|m| m.to_string()).collect(),
            credentials: CredentialsConfig::default(),
            commands: CommandsConfig::default(),
            ssh: SshConfig::default(),
            tls: TlsSettings::default(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            server: "ambari-server".to_string(),
            agent: "ambari-agent".to_string(),
            server_running_marker: "Ambari Server running".to_string(),
            agent_running_marker: "ambari-agent running".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            user: None,
            connect_timeout_secs: 10,
        }
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> RehostResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RehostError::SettingsInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content).map_err(|reason| RehostError::SettingsInvalid {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load from `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> RehostResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }
}
