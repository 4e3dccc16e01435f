//! `init`, `config show` and `config reset`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use metrics_core::config::{AgentConfig, DEFAULT_CONFIG_TEMPLATE, LOCAL_CONFIG_FILE};

const ENV_HELP: &str = "  METRICS_API_KEY - Your API key
  METRICS_ENDPOINT - Ingestion endpoint
  METRICS_HOST_ID - Unique host identifier
  METRICS_HOSTNAME - Reported hostname
  METRICS_COLLECTION_INTERVAL - Collection interval in seconds
  METRICS_TAGS - Comma-separated key:value tags";

pub fn run_init() -> Result<()> {
    let path = write_template(Path::new("."))?;
    println!("Created {}", path.display());
    println!(
        "Edit the file with your settings, then run with: sdk-metrics -c {}",
        LOCAL_CONFIG_FILE
    );
    Ok(())
}

pub fn run_reset() -> Result<()> {
    let removed = remove_config_files(&AgentConfig::search_paths());
    if removed.is_empty() {
        println!("No config files found to remove");
    }
    for path in &removed {
        println!("Removed: {}", path.display());
    }

    println!("\nConfiguration reset; settings now come from environment variables:");
    println!("{}", ENV_HELP);
    Ok(())
}

pub fn run_show(config: &AgentConfig) {
    println!("{}", render(config));
}

/// Write the default config into `dir`, refusing to overwrite an existing one
fn write_template(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(LOCAL_CONFIG_FILE);
    if path.exists() {
        anyhow::bail!("{} already exists, not overwriting", path.display());
    }
    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Delete every existing file in `paths`; returns the ones removed
fn remove_config_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|p| p.is_file())
        .filter_map(|p| match std::fs::remove_file(p) {
            Ok(()) => Some(p.clone()),
            Err(e) => {
                warn!("failed to remove {}: {}", p.display(), e);
                None
            }
        })
        .collect()
}

fn render(config: &AgentConfig) -> String {
    let tags = config
        .tags
        .iter()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "Current configuration:
  Endpoint: {}
  API Key: {}
  Host ID: {}
  Hostname: {}
  Collection Interval: {}s
  Tags: {}",
        config.endpoint,
        config.masked_api_key(),
        config.host_id,
        config.hostname,
        config.collection_interval,
        tags,
    )
}
