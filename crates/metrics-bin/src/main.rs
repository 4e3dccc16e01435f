use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use metrics_core::agent;
use metrics_core::collector::MetricsCollector;
use metrics_core::config::{parse_tags, AgentConfig};
use metrics_core::transport::HttpTransport;
use metrics_platform::counters::SystemCounters;

mod config_cmd;

#[derive(Parser, Debug)]
#[command(name = "sdk-metrics")]
#[command(about = "System metrics collector - sends CPU, RAM and network metrics to an ingestion endpoint")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "METRICS_LOG_LEVEL", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Settings that take precedence over the config file
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Path to config file (default: first of the standard locations that exists)
    #[arg(long, short = 'c', env = "METRICS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Ingestion endpoint base URL
    #[arg(long, env = "METRICS_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// API key sent as X-API-Key
    #[arg(long, env = "METRICS_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Unique host identifier (default: OS hostname)
    #[arg(long, env = "METRICS_HOST_ID", global = true)]
    host_id: Option<String>,

    /// Reported hostname (default: OS hostname)
    #[arg(long, env = "METRICS_HOSTNAME", global = true)]
    hostname: Option<String>,

    /// Collection interval in seconds
    #[arg(long, env = "METRICS_COLLECTION_INTERVAL", global = true)]
    interval: Option<u64>,

    /// Tags as key1:value1,key2:value2
    #[arg(long, env = "METRICS_TAGS", global = true)]
    tags: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the metrics collection agent (default)
    Start,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Create a default config file in the current directory
    Init,
    /// Print version information
    Version,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show the resolved configuration
    Show,
    /// Remove config files from all standard locations
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Some(Commands::Version) => {
            println!("sdk-metrics version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init) => config_cmd::run_init(),
        Some(Commands::Config {
            action: ConfigAction::Reset,
        }) => config_cmd::run_reset(),
        Some(Commands::Config {
            action: ConfigAction::Show,
        }) => {
            let config = load_config(&cli.overrides);
            config_cmd::run_show(&config);
            Ok(())
        }
        Some(Commands::Start) | None => run_agent(load_config(&cli.overrides)).await,
    }
}

/// File (explicit or discovered) then CLI/env overrides, then OS hostname for
/// identity fields left empty.
fn load_config(overrides: &Overrides) -> AgentConfig {
    let path = overrides.config.clone().or_else(AgentConfig::find_config_file);

    let mut config = match path {
        Some(path) => match AgentConfig::load(&path) {
            Ok(config) => {
                info!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{:#}; falling back to environment and defaults", e);
                AgentConfig::default()
            }
        },
        None => AgentConfig::default(),
    };

    overrides.apply(&mut config);
    config.apply_defaults();
    config.resolve_identity(&os_hostname());
    config
}

impl Overrides {
    fn apply(&self, config: &mut AgentConfig) {
        if let Some(endpoint) = non_empty(&self.endpoint) {
            config.endpoint = endpoint;
        }
        if let Some(api_key) = non_empty(&self.api_key) {
            config.api_key = api_key;
        }
        if let Some(host_id) = non_empty(&self.host_id) {
            config.host_id = host_id;
        }
        if let Some(hostname) = non_empty(&self.hostname) {
            config.hostname = hostname;
        }
        if let Some(interval) = self.interval {
            config.collection_interval = interval;
        }
        if let Some(tags) = non_empty(&self.tags) {
            config.tags = parse_tags(&tags);
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn os_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn create_counters() -> Result<Box<dyn SystemCounters>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(metrics_linux::counters::LinuxCounters::new()))
    }
    #[cfg(not(target_os = "linux"))]
    {
        anyhow::bail!("no counter source for {}", std::env::consts::OS)
    }
}

async fn run_agent(config: AgentConfig) -> Result<()> {
    if config.api_key.is_empty() {
        anyhow::bail!(
            "API key is required (--api-key, METRICS_API_KEY or api_key in the config file)"
        );
    }

    info!(
        "sdk-metrics v{} starting (os={}, arch={})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    );
    info!("endpoint: {}", config.endpoint);
    info!("host: {} ({})", config.hostname, config.host_id);

    let mut collector = MetricsCollector::new(create_counters()?);
    let mut transport = HttpTransport::new(&config).context("failed to create http transport")?;

    agent::run(
        &mut collector,
        &mut transport,
        Duration::from_secs(config.collection_interval),
        shutdown_signal(),
    )
    .await;

    info!("agent stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
