use thiserror::Error;

/// Cumulative CPU time buckets (ticks since boot), aggregated over all cores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    /// Sum of all buckets, excluding guest time already counted in user and nice
    pub total: u64,
}

/// Point-in-time memory occupancy in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub cached: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
}

/// Cumulative byte counters of one network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {path}: {reason}")]
    Parse { path: String, reason: String },
}

impl CounterError {
    pub fn parse(path: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Raw OS counters and static host identity.
///
/// Implementations only read; all derivation (deltas, rates, percentages)
/// happens in the collector.
pub trait SystemCounters: Send + Sync {
    fn hostname(&self) -> String;
    fn os_name(&self) -> String;
    fn os_version(&self) -> Option<String>;
    fn arch(&self) -> String;
    fn cpu_times(&self) -> Result<CpuTimes, CounterError>;
    fn memory(&self) -> Result<MemoryStats, CounterError>;
    fn network_interfaces(&self) -> Result<Vec<InterfaceCounters>, CounterError>;
}
