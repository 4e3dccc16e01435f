// Platform abstractions shared by the collector and the per-OS counter sources

pub mod counters;
