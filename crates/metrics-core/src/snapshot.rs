//! Derived, transmit-ready metrics records and their JSON wire shape.
//!
//! Optional and counter-style fields are omitted from the JSON when zero or
//! empty, and read back as zero when absent.

use serde::{Deserialize, Serialize};

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

/// One collection cycle's worth of host metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub hostname: String,
    /// Unix time in milliseconds
    pub timestamp: i64,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<DiskMetrics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkMetrics>,
}

/// Share of the sampling window spent in each CPU state, in percent.
/// Categories are independent and need not sum to 100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub user: f64,
    pub system: f64,
    pub idle: f64,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub iowait: f64,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub steal: f64,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub nice: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMetrics {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub available: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub cached: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub buffers: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub swap_total: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub swap_used: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub swap_free: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskMetrics {
    pub device: String,
    pub mount_point: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub inodes_total: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub inodes_used: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub inodes_free: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub read_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub write_bytes: u64,
}

impl DiskMetrics {
    /// Zero-valued entry for the root filesystem. Disk usage is not sampled yet.
    pub fn root_placeholder() -> Self {
        Self {
            device: "/".to_string(),
            mount_point: "/".to_string(),
            ..Self::default()
        }
    }
}

/// Per-interface throughput. `rx_bytes`/`tx_bytes` are rates in bytes per
/// second, not cumulative counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetrics {
    pub interface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub rx_packets: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub tx_packets: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub rx_errors: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub tx_errors: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub rx_dropped: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub tx_dropped: u64,
}

impl SystemMetrics {
    /// Busy CPU share (user + system)
    pub fn cpu_busy_percent(&self) -> f64 {
        self.cpu.user + self.cpu.system
    }

    pub fn memory_used_percent(&self) -> f64 {
        if self.memory.total == 0 {
            return 0.0;
        }
        self.memory.used as f64 / self.memory.total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SystemMetrics {
        SystemMetrics {
            hostname: "web-01".to_string(),
            timestamp: 1_700_000_000_123,
            os: "linux".to_string(),
            os_version: Some("Debian GNU/Linux 12 (bookworm)".to_string()),
            architecture: Some("amd64".to_string()),
            cpu: CpuMetrics {
                user: 12.345678901234,
                system: 3.5,
                idle: 84.154321098766,
                iowait: 0.0,
                steal: 0.0,
                nice: 0.1,
            },
            memory: MemoryMetrics {
                total: 16_000_000_000,
                used: 7_000_000_000,
                free: 4_000_000_000,
                available: 4_000_000_000,
                cached: 3_000_000_000,
                buffers: 0,
                swap_total: 2_000_000_000,
                swap_used: 500_000_000,
                swap_free: 1_500_000_000,
            },
            disks: vec![DiskMetrics::root_placeholder()],
            networks: vec![NetworkMetrics {
                interface: "eth0".to_string(),
                rx_bytes: 500,
                tx_bytes: 200,
                ..NetworkMetrics::default()
            }],
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let metrics = sample();
        let json = serde_json::to_string(&metrics).unwrap();
        let decoded: SystemMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, metrics);
    }

    #[test]
    fn test_wire_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["osVersion"], "Debian GNU/Linux 12 (bookworm)");
        assert_eq!(value["memory"]["swapTotal"], 2_000_000_000u64);
        assert_eq!(value["disks"][0]["mountPoint"], "/");
        assert_eq!(value["networks"][0]["interface"], "eth0");
        assert_eq!(value["networks"][0]["rxBytes"], 500);
        assert_eq!(value["timestamp"], 1_700_000_000_123i64);
    }

    #[test]
    fn test_zero_fields_are_omitted() {
        let value = serde_json::to_value(sample()).unwrap();
        let cpu = value["cpu"].as_object().unwrap();
        assert!(!cpu.contains_key("iowait"));
        assert!(!cpu.contains_key("steal"));
        assert!(cpu.contains_key("nice"));

        assert!(value["memory"].get("buffers").is_none());
        assert!(value["networks"][0].get("rxPackets").is_none());
        assert!(value["disks"][0].get("inodesTotal").is_none());
        // required fields stay even when zero
        assert_eq!(value["disks"][0]["total"], 0);
    }

    #[test]
    fn test_empty_optionals_are_omitted() {
        let mut metrics = sample();
        metrics.os_version = None;
        metrics.architecture = None;
        metrics.disks.clear();
        metrics.networks.clear();

        let value = serde_json::to_value(&metrics).unwrap();
        let obj = value.as_object().unwrap();
        for key in ["osVersion", "architecture", "disks", "networks"] {
            assert!(!obj.contains_key(key), "{} should be omitted", key);
        }

        let decoded: SystemMetrics = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, metrics);
    }

    #[test]
    fn test_parse_minimal_payload() {
        let raw = r#"{"hostname":"h","timestamp":1,"os":"linux",
            "cpu":{"user":1.0,"system":2.0,"idle":97.0},
            "memory":{"total":10,"used":5,"free":5,"available":5}}"#;
        let metrics: SystemMetrics = serde_json::from_str(raw).unwrap();
        assert_eq!(metrics.cpu.iowait, 0.0);
        assert_eq!(metrics.memory.swap_total, 0);
        assert!(metrics.networks.is_empty());
        assert!(metrics.os_version.is_none());
    }

    #[test]
    fn test_usage_percentages() {
        let metrics = sample();
        assert!((metrics.cpu_busy_percent() - 15.845678901234).abs() < 1e-9);
        assert!((metrics.memory_used_percent() - 43.75).abs() < 1e-9);

        let mut empty = metrics;
        empty.memory.total = 0;
        assert_eq!(empty.memory_used_percent(), 0.0);
    }
}
