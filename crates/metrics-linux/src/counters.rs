use std::fs;

use metrics_platform::counters::{
    CounterError, CpuTimes, InterfaceCounters, MemoryStats, SystemCounters,
};
use tracing::debug;

const PROC_STAT: &str = "/proc/stat";
const PROC_MEMINFO: &str = "/proc/meminfo";
const PROC_NET_DEV: &str = "/proc/net/dev";
const OS_RELEASE: &str = "/etc/os-release";

/// Index of the first guest column in a /proc/stat cpu line
const GUEST_COLUMN: usize = 8;

pub struct LinuxCounters;

impl LinuxCounters {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LinuxCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCounters for LinuxCounters {
    fn hostname(&self) -> String {
        hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn os_name(&self) -> String {
        "linux".to_string()
    }

    fn os_version(&self) -> Option<String> {
        fs::read_to_string(OS_RELEASE)
            .ok()
            .and_then(|content| parse_os_release(&content))
    }

    fn arch(&self) -> String {
        wire_arch(std::env::consts::ARCH).to_string()
    }

    fn cpu_times(&self) -> Result<CpuTimes, CounterError> {
        parse_proc_stat(&read_proc(PROC_STAT)?)
    }

    fn memory(&self) -> Result<MemoryStats, CounterError> {
        parse_meminfo(&read_proc(PROC_MEMINFO)?)
    }

    fn network_interfaces(&self) -> Result<Vec<InterfaceCounters>, CounterError> {
        let interfaces = parse_net_dev(&read_proc(PROC_NET_DEV)?)?;
        debug!("read counters for {} interfaces", interfaces.len());
        Ok(interfaces)
    }
}

fn read_proc(path: &str) -> Result<String, CounterError> {
    fs::read_to_string(path).map_err(|source| CounterError::Io {
        path: path.to_string(),
        source,
    })
}

/// Receivers expect Go's GOARCH spelling
fn wire_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "loongarch64" => "loong64",
        "powerpc" => "ppc",
        "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
        "powerpc64" => "ppc64",
        other => other,
    }
}

fn parse_os_release(content: &str) -> Option<String> {
    content
        .lines()
        .find(|l| l.starts_with("PRETTY_NAME="))
        .map(|l| {
            l.trim_start_matches("PRETTY_NAME=")
                .trim_matches('"')
                .to_string()
        })
        .filter(|s| !s.is_empty())
}

/// Parse the aggregate `cpu` line of /proc/stat.
///
/// Columns: user nice system idle iowait irq softirq steal guest guest_nice.
/// Older kernels report fewer columns; missing ones read as zero. Guest time is
/// already included in user and nice, so it stays out of the total.
pub fn parse_proc_stat(content: &str) -> Result<CpuTimes, CounterError> {
    let line = content
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| CounterError::parse(PROC_STAT, "no aggregate cpu line"))?;

    let values = line
        .split_whitespace()
        .skip(1)
        .map(|s| s.parse::<u64>())
        .collect::<Result<Vec<u64>, _>>()
        .map_err(|e| CounterError::parse(PROC_STAT, format!("bad cpu column: {}", e)))?;

    if values.len() < 4 {
        return Err(CounterError::parse(
            PROC_STAT,
            format!("expected at least 4 cpu columns, got {}", values.len()),
        ));
    }

    let col = |i: usize| values.get(i).copied().unwrap_or(0);
    let total = values.iter().take(GUEST_COLUMN).sum();

    Ok(CpuTimes {
        user: col(0),
        nice: col(1),
        system: col(2),
        idle: col(3),
        iowait: col(4),
        irq: col(5),
        softirq: col(6),
        steal: col(7),
        total,
    })
}

pub fn parse_meminfo(content: &str) -> Result<MemoryStats, CounterError> {
    let mut total_kb = None;
    let mut available_kb = None;
    let mut free_kb = 0u64;
    let mut buffers_kb = 0u64;
    let mut cached_kb = 0u64;
    let mut swap_total_kb = 0u64;
    let mut swap_free_kb = 0u64;

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        let value: u64 = match parts[1].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };

        match parts[0] {
            "MemTotal:" => total_kb = Some(value),
            "MemAvailable:" => available_kb = Some(value),
            "MemFree:" => free_kb = value,
            "Buffers:" => buffers_kb = value,
            "Cached:" => cached_kb = value,
            "SwapTotal:" => swap_total_kb = value,
            "SwapFree:" => swap_free_kb = value,
            _ => {}
        }
    }

    let total_kb = total_kb.ok_or_else(|| CounterError::parse(PROC_MEMINFO, "missing MemTotal"))?;

    // Kernels before 3.14 have no MemAvailable
    let used_kb = match available_kb {
        Some(available) => total_kb.saturating_sub(available),
        None => total_kb
            .saturating_sub(free_kb)
            .saturating_sub(buffers_kb)
            .saturating_sub(cached_kb),
    };

    Ok(MemoryStats {
        total: total_kb * 1024,
        used: used_kb * 1024,
        free: free_kb * 1024,
        cached: cached_kb * 1024,
        swap_total: swap_total_kb * 1024,
        swap_used: swap_total_kb.saturating_sub(swap_free_kb) * 1024,
        swap_free: swap_free_kb * 1024,
    })
}

/// Parse /proc/net/dev. The first two lines are headers; each following line is
/// `name: rx_bytes rx_packets ... (8 rx columns) tx_bytes ...`.
pub fn parse_net_dev(content: &str) -> Result<Vec<InterfaceCounters>, CounterError> {
    let mut interfaces = Vec::new();

    for line in content.lines().skip(2) {
        let (name, stats) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };

        let columns: Vec<&str> = stats.split_whitespace().collect();
        if columns.len() < 9 {
            return Err(CounterError::parse(
                PROC_NET_DEV,
                format!("interface {} has {} columns", name.trim(), columns.len()),
            ));
        }

        let parse = |s: &str| {
            s.parse::<u64>().map_err(|e| {
                CounterError::parse(PROC_NET_DEV, format!("{}: {}", name.trim(), e))
            })
        };

        interfaces.push(InterfaceCounters {
            name: name.trim().to_string(),
            rx_bytes: parse(columns[0])?,
            tx_bytes: parse(columns[8])?,
        });
    }

    Ok(interfaces)
}
