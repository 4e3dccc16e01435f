use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::collector::{CollectError, MetricsCollector};
use crate::transport::{HttpTransport, TransportError};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to collect metrics: {0}")]
    Collect(#[from] CollectError),
    #[error("failed to deliver metrics: {0}")]
    Send(#[from] TransportError),
}

/// Collect one snapshot and post it
pub async fn collect_and_send(
    collector: &mut MetricsCollector,
    transport: &HttpTransport,
) -> Result<(), AgentError> {
    let metrics = collector.collect().await?;
    transport.send(&metrics).await?;
    info!(
        "metrics sent (cpu: {:.1}%, mem: {}/{} ({:.1}%))",
        metrics.cpu_busy_percent(),
        format_bytes(metrics.memory.used),
        format_bytes(metrics.memory.total),
        metrics.memory_used_percent(),
    );
    Ok(())
}

/// Run a cycle, logging errors instead of propagating
pub async fn collect_and_send_quiet(collector: &mut MetricsCollector, transport: &HttpTransport) {
    if let Err(e) = collect_and_send(collector, transport).await {
        error!("{}", e);
    }
}

/// Drive the collect/send cycle until `shutdown` resolves.
///
/// The first cycle runs immediately, then once per `interval`. A cycle still
/// in flight when `shutdown` resolves is abandoned. The transport is closed
/// before returning.
pub async fn run<F>(
    collector: &mut MetricsCollector,
    transport: &mut HttpTransport,
    interval: Duration,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("collecting every {}s", interval.as_secs());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("shutdown requested, abandoning in-flight cycle");
                        break;
                    }
                    _ = collect_and_send_quiet(collector, transport) => {}
                }
            }
        }
    }

    transport.close();
}

fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let units = ["B", "KB", "MB", "GB", "TB"];
    let i = (bytes as f64).log(1024.0).floor() as usize;
    let i = i.min(units.len() - 1);
    let val = bytes as f64 / 1024f64.powi(i as i32);
    if i == 0 {
        format!("{} {}", val as u64, units[i])
    } else {
        format!("{:.1} {}", val, units[i])
    }
}
