//! Agent configuration
//!
//! TOML file, `<config dir>/probekit/agent.toml` unless given explicitly:
//!
//! ```toml
//! confd_dir = "/etc/probekit/conf.d"
//! output = "mqtt"
//!
//! [mqtt]
//! host = "broker.local"
//! port = 1883
//! topic_prefix = "probekit/checks"
//! ```

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    Stdout,
    Mqtt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory holding one `<check>.yaml` per check
    pub confd_dir: PathBuf,
    pub output: Output,
    pub mqtt: MqttConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Submissions go to `<topic_prefix>/<check>@v1`
    pub topic_prefix: String,
    /// Largest packet sent or accepted, in bytes
    pub max_packet_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            confd_dir: PathBuf::from("conf.d"),
            output: Output::Stdout,
            mqtt: MqttConfig::default(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: "probekit-agent".to_string(),
            keep_alive_secs: 60,
            topic_prefix: "probekit/checks".to_string(),
            max_packet_size: 4 * 1024 * 1024,
        }
    }
}

impl MqttConfig {
    pub fn topic(&self, check: &str) -> String {
        format!("{}/{}@v1", self.topic_prefix.trim_end_matches('/'), check)
    }
}

impl AgentConfig {
    /// Load from `path`, or the default location. A missing file yields defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: AgentConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid agent config {}", config_path.display()))?;
        Ok(config)
    }

    /// OS-specific config file path
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("probekit");
        path.push("agent.toml");
        Ok(path)
    }
}
