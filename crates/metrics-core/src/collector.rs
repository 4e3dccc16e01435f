use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use metrics_platform::counters::{
    CounterError, CpuTimes, InterfaceCounters, MemoryStats, SystemCounters,
};

use crate::snapshot::{CpuMetrics, DiskMetrics, MemoryMetrics, NetworkMetrics, SystemMetrics};

/// Gap between the two CPU counter reads of a single collection
pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_millis(500);

const LOOPBACK_INTERFACE: &str = "lo";

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("cpu counters unavailable: {0}")]
    Cpu(#[source] CounterError),
    #[error("memory counters unavailable: {0}")]
    Memory(#[source] CounterError),
    #[error("network counters unavailable: {0}")]
    Network(#[source] CounterError),
}

/// Last observed byte counters of one interface
#[derive(Debug, Clone, Copy)]
struct NetworkSample {
    rx_bytes: u64,
    tx_bytes: u64,
    at: Instant,
}

/// Turns raw OS counters into a [`SystemMetrics`] snapshot.
///
/// CPU usage is measured within a single call; network rates are measured
/// between consecutive calls, so the collector keeps the previous interface
/// counters. `collect` takes `&mut self`: one collector serves one driver.
pub struct MetricsCollector {
    counters: Box<dyn SystemCounters>,
    hostname: String,
    os: String,
    os_version: Option<String>,
    arch: String,
    prev_network: HashMap<String, NetworkSample>,
}

impl MetricsCollector {
    pub fn new(counters: Box<dyn SystemCounters>) -> Self {
        Self {
            hostname: counters.hostname(),
            os: counters.os_name(),
            os_version: counters.os_version(),
            arch: counters.arch(),
            counters,
            prev_network: HashMap::new(),
        }
    }

    /// Take one snapshot. Any counter read failure discards the whole snapshot.
    ///
    /// Spends [`CPU_SAMPLE_WINDOW`] waiting between CPU reads; dropping the
    /// future cancels the wait.
    pub async fn collect(&mut self) -> Result<SystemMetrics, CollectError> {
        let timestamp = Utc::now().timestamp_millis();

        let cpu = self.collect_cpu().await?;
        let memory = memory_metrics(&self.counters.memory().map_err(CollectError::Memory)?);

        let interfaces = self
            .counters
            .network_interfaces()
            .map_err(CollectError::Network)?;
        let networks = self.update_network(interfaces, Instant::now());

        debug!(
            "collected snapshot: {} network rates, {} tracked interfaces",
            networks.len(),
            self.prev_network.len()
        );

        Ok(SystemMetrics {
            hostname: self.hostname.clone(),
            timestamp,
            os: self.os.clone(),
            os_version: self.os_version.clone(),
            architecture: Some(self.arch.clone()),
            cpu,
            memory,
            disks: vec![DiskMetrics::root_placeholder()],
            networks,
        })
    }

    async fn collect_cpu(&self) -> Result<CpuMetrics, CollectError> {
        let before = self.counters.cpu_times().map_err(CollectError::Cpu)?;
        tokio::time::sleep(CPU_SAMPLE_WINDOW).await;
        let after = self.counters.cpu_times().map_err(CollectError::Cpu)?;
        Ok(cpu_percentages(&before, &after))
    }

    /// Compute rates against the stored counters, then replace the stored
    /// counters with `current`. Interfaces absent from `current` are forgotten.
    fn update_network(
        &mut self,
        current: Vec<InterfaceCounters>,
        now: Instant,
    ) -> Vec<NetworkMetrics> {
        let mut rates = Vec::new();
        let mut samples = HashMap::with_capacity(current.len());

        for iface in current {
            if iface.name == LOOPBACK_INTERFACE {
                continue;
            }

            if let Some(prev) = self.prev_network.get(&iface.name) {
                if let Some(rate) = interface_rate(&iface, prev, now) {
                    rates.push(rate);
                }
            }

            samples.insert(
                iface.name,
                NetworkSample {
                    rx_bytes: iface.rx_bytes,
                    tx_bytes: iface.tx_bytes,
                    at: now,
                },
            );
        }

        self.prev_network = samples;
        rates
    }
}

/// Per-category share of the window between two reads. A zero total delta is
/// treated as 1 so the result stays finite.
pub fn cpu_percentages(before: &CpuTimes, after: &CpuTimes) -> CpuMetrics {
    let total = after.total.saturating_sub(before.total).max(1) as f64;

    let share = |a: u64, b: u64| b.saturating_sub(a) as f64 / total * 100.0;

    CpuMetrics {
        user: share(before.user, after.user),
        system: share(before.system, after.system),
        idle: share(before.idle, after.idle),
        // not derived from this counter source
        iowait: 0.0,
        steal: 0.0,
        nice: share(before.nice, after.nice),
    }
}

/// `available` mirrors `free`; receivers depend on that.
pub fn memory_metrics(mem: &MemoryStats) -> MemoryMetrics {
    MemoryMetrics {
        total: mem.total,
        used: mem.used,
        free: mem.free,
        available: mem.free,
        cached: mem.cached,
        buffers: 0,
        swap_total: mem.swap_total,
        swap_used: mem.swap_used,
        swap_free: mem.swap_free,
    }
}

fn interface_rate(
    current: &InterfaceCounters,
    prev: &NetworkSample,
    now: Instant,
) -> Option<NetworkMetrics> {
    let elapsed = now.saturating_duration_since(prev.at).as_secs_f64();
    if elapsed <= 0.0 {
        return None;
    }

    // a counter that went backwards was reset; report no traffic
    let rx = current.rx_bytes.saturating_sub(prev.rx_bytes) as f64 / elapsed;
    let tx = current.tx_bytes.saturating_sub(prev.tx_bytes) as f64 / elapsed;

    Some(NetworkMetrics {
        interface: current.name.clone(),
        rx_bytes: rx as u64,
        tx_bytes: tx as u64,
        ..NetworkMetrics::default()
    })
}
