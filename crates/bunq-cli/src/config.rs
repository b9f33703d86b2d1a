/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed CLI configuration and resolved paths
[POS]:    Configuration layer - API credentials and context location
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use bunq_core::Environment;
use serde::{Deserialize, Serialize};

const CONTEXT_DIR: &str = "bunq";
const CONTEXT_FILE: &str = "context.json";

/// Top-level configuration for the bunq CLI
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CliConfig {
    /// Deployment to use when `api_url` is not set
    #[serde(default)]
    pub environment: Environment,
    /// Explicit API base URL, overrides `environment`
    #[serde(default)]
    pub api_url: Option<String>,
    /// API key registered with the device
    pub api_key: String,
    #[serde(default = "default_device_description")]
    pub device_description: String,
    /// IPs allowed to use the API key; `*` allows any
    #[serde(default = "default_permitted_ips")]
    pub permitted_ips: Vec<String>,
    /// Where the client context is persisted
    #[serde(default)]
    pub context_file: Option<PathBuf>,
}

fn default_device_description() -> String {
    "bunq-cli".to_string()
}

fn default_permitted_ips() -> Vec<String> {
    vec![bunq_core::WILDCARD_IP.to_string()]
}

impl CliConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            bail!("api_key cannot be empty");
        }
        if self.permitted_ips.is_empty() {
            bail!("permitted_ips cannot be empty");
        }
        Ok(())
    }

    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }

    /// Context path from the flag, then the config, then the user config dir
    pub fn context_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = flag.map(Path::to_path_buf).or_else(|| self.context_file.clone()) {
            return Ok(path);
        }
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("could not determine config directory"))?;
        Ok(config_dir.join(CONTEXT_DIR).join(CONTEXT_FILE))
    }
}
