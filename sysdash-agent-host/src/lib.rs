//! Sysdash Agent Host - what a node knows about its own machine
//!
//! - Per-second network rates from cumulative OS counters
//! - System metrics snapshot (CPU, memory, disks, network, processes)
//! - Hostname and advertised address discovery
//! - Log sources exposed by the local node

pub mod discovery;
pub mod logs;
pub mod metrics;
pub mod rates;

pub use logs::LogSources;
pub use metrics::{NetIoCounters, NodeSnapshot};
pub use rates::{CounterReading, InterfaceRate, RateSampler};
