// Linux counter source backed by procfs

#[cfg(target_os = "linux")]
pub mod counters;
