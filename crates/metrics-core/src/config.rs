use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3333";

/// File name used by `init` and searched for in the working directory
pub const LOCAL_CONFIG_FILE: &str = "sdk-metrics.yaml";

/// Written by `sdk-metrics init`
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"endpoint: "http://localhost:3333"
api_key: "your_api_key_here"
host_id: ""
hostname: ""
collection_interval: 10
tags:
  env: production
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Ingestion server base URL (e.g., https://errorwatch.example.com)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Shared secret sent as X-API-Key
    #[serde(default)]
    pub api_key: String,

    /// Stable host identifier; defaults to the OS hostname
    #[serde(default)]
    pub host_id: String,

    /// Reported hostname; defaults to the OS hostname
    #[serde(default)]
    pub hostname: String,

    /// Collection interval in seconds
    #[serde(default = "default_collection_interval")]
    pub collection_interval: u64,

    /// Static tags attached to every payload
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_collection_interval() -> u64 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            host_id: String::new(),
            hostname: String::new(),
            collection_interval: default_collection_interval(),
            tags: BTreeMap::new(),
        }
    }
}

impl AgentConfig {
    /// Locations checked for a config file, in priority order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/sdk-metrics/config.yaml")];
        if let Some(dirs) = directories::BaseDirs::new() {
            paths.push(dirs.home_dir().join(".sdk-metrics").join("config.yaml"));
        }
        paths.push(PathBuf::from(LOCAL_CONFIG_FILE));
        paths
    }

    /// First existing file from [`AgentConfig::search_paths`]
    pub fn find_config_file() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|p| p.is_file())
    }

    /// Load config from a YAML file. Missing keys take their defaults and
    /// unknown keys are ignored.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let mut config: Self = serde_yaml::from_str(&data)
            .with_context(|| format!("failed to parse config YAML in {}", path.display()))?;
        config.apply_defaults();
        Ok(config)
    }

    /// Save config to a file path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {}", parent.display()))?;
        }
        let data = serde_yaml::to_string(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Replace zero/empty values that mean "unset" with their defaults
    pub fn apply_defaults(&mut self) {
        if self.collection_interval == 0 {
            self.collection_interval = default_collection_interval();
        }
        if self.endpoint.is_empty() {
            self.endpoint = default_endpoint();
        }
    }

    /// Fill host id and hostname from the OS hostname where unset
    pub fn resolve_identity(&mut self, os_hostname: &str) {
        if self.host_id.is_empty() {
            self.host_id = os_hostname.to_string();
        }
        if self.hostname.is_empty() {
            self.hostname = os_hostname.to_string();
        }
    }

    /// API key safe for display: the first 8 characters, then `***`
    pub fn masked_api_key(&self) -> String {
        if self.api_key.chars().count() <= 8 {
            return "***".to_string();
        }
        let prefix: String = self.api_key.chars().take(8).collect();
        format!("{}***", prefix)
    }

    /// Get the metrics ingestion URL
    pub fn ingest_url(&self) -> String {
        format!("{}/api/v1/metrics/ingest", self.endpoint.trim_end_matches('/'))
    }
}

/// Parse `key1:value1,key2:value2`. Whitespace around keys and values is
/// trimmed; pairs without exactly one `:` are skipped.
pub fn parse_tags(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let parts: Vec<&str> = pair
                .split(':')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            match parts.as_slice() {
                [key, value] => Some((key.to_string(), value.to_string())),
                _ => None,
            }
        })
        .collect()
}
