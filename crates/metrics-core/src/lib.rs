pub mod agent;
pub mod collector;
pub mod config;
pub mod snapshot;
pub mod transport;

#[cfg(test)]
mod testing;
