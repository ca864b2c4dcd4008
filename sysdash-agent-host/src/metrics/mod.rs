//! System metrics collection for sysdash nodes
//!
//! Produces the snapshot a node hands out over `get_stats`:
//! - system identity, uptime and load averages
//! - CPU usage (global and per core)
//! - memory and swap usage
//! - disk usage for mounted filesystems
//! - per-interface network rates (via [`NetIoCounters`])
//! - process counts and top consumers

use crate::discovery::{self, InterfaceType};
use crate::rates::{CounterReading, InterfaceRate, RateSampler};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use sysinfo::{Disks, Networks, ProcessStatus, System};
use tracing::debug;

/// Entries kept in each "top" process list
pub const TOP_PROCESSES: usize = 15;

/// Complete metrics snapshot of one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub collected_at: i64,
    pub system: SystemInfo,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub swap: SwapMetrics,
    pub disks: Vec<DiskMetrics>,
    pub network: BTreeMap<String, NetworkInterfaceStats>,
    pub processes: ProcessInfo,
}

/// Host identity and uptime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub uptime_secs: u64,
    pub load_avg: [f64; 3],  // [1min, 5min, 15min]
}

/// CPU usage metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub percent: f32,
    pub per_core: Vec<f32>,
    pub core_count: usize,
}

/// Memory usage metrics (bytes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f32,
}

/// Swap usage metrics (bytes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapMetrics {
    pub total: u64,
    pub used: u64,
    pub percent: f32,
}

/// Disk usage per mounted filesystem (bytes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub name: String,
    pub mount_point: String,
    pub total: u64,
    pub available: u64,
    pub percent_used: f32,
}

/// Per-interface network throughput
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterfaceStats {
    #[serde(flatten)]
    pub rate: InterfaceRate,
    pub kind: InterfaceType,
    pub addresses: Vec<String>,
}

/// Process information summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub total_count: usize,
    pub running_count: usize,
    pub top_cpu: Vec<ProcessEntry>,
    pub top_memory: Vec<ProcessEntry>,
}

/// Individual process entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

/// OS network counters feeding a [`RateSampler`].
///
/// Owned by the local node; only the derived rates ever leave the process.
pub struct NetIoCounters {
    networks: Networks,
    sampler: RateSampler,
}

impl NetIoCounters {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
            sampler: RateSampler::new(),
        }
    }

    /// Current cumulative counters per interface
    pub fn read(&mut self) -> HashMap<String, CounterReading> {
        self.networks.refresh_list();
        self.networks.refresh();
        self.networks
            .iter()
            .map(|(name, data)| {
                (
                    name.clone(),
                    CounterReading::new(data.total_received(), data.total_transmitted()),
                )
            })
            .collect()
    }

    /// Sample the OS counters and return per-second rates
    pub fn update(&mut self) -> BTreeMap<String, InterfaceRate> {
        let counters = self.read();
        self.sampler.update(&counters)
    }
}

impl Default for NetIoCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeSnapshot {
    /// Collect a snapshot using already computed network rates
    pub async fn collect(rates: BTreeMap<String, InterfaceRate>) -> Result<Self> {
        debug!("Collecting node snapshot...");

        let mut sys = System::new_all();
        sys.refresh_all();

        // Wait a moment for accurate CPU readings
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL.max(std::time::Duration::from_millis(200))).await;
        sys.refresh_cpu_usage();
        sys.refresh_processes();

        let addresses = discovery::interface_addresses();
        let network = rates
            .into_iter()
            .map(|(name, rate)| {
                let addrs = addresses.get(&name).cloned().unwrap_or_default();
                let kind = discovery::classify_interface(&name);
                (name, NetworkInterfaceStats { rate, kind, addresses: addrs })
            })
            .collect();

        Ok(NodeSnapshot {
            collected_at: chrono::Utc::now().timestamp(),
            system: SystemInfo::collect(),
            cpu: CpuMetrics::collect(&sys),
            memory: MemoryMetrics::collect(&sys),
            swap: SwapMetrics::collect(&sys),
            disks: DiskMetrics::collect(),
            network,
            processes: ProcessInfo::collect(&sys),
        })
    }
}

impl SystemInfo {
    fn collect() -> Self {
        let load = System::load_average();
        SystemInfo {
            hostname: discovery::hostname(),
            os: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: System::os_version(),
            kernel_version: System::kernel_version(),
            uptime_secs: System::uptime(),
            load_avg: [load.one, load.five, load.fifteen],
        }
    }
}

impl CpuMetrics {
    fn collect(sys: &System) -> Self {
        let per_core: Vec<f32> = sys.cpus().iter().map(|cpu| finite(cpu.cpu_usage())).collect();
        CpuMetrics {
            percent: finite(sys.global_cpu_info().cpu_usage()),
            core_count: per_core.len(),
            per_core,
        }
    }
}

impl MemoryMetrics {
    fn collect(sys: &System) -> Self {
        let total = sys.total_memory();
        let available = sys.available_memory();
        let used = total.saturating_sub(available);
        MemoryMetrics {
            total,
            used,
            available,
            percent: percent(used, total),
        }
    }
}

impl SwapMetrics {
    fn collect(sys: &System) -> Self {
        let total = sys.total_swap();
        let used = sys.used_swap();
        SwapMetrics { total, used, percent: percent(used, total) }
    }
}

impl DiskMetrics {
    fn collect() -> Vec<Self> {
        let disks = Disks::new_with_refreshed_list();
        disks
            .iter()
            .map(|disk| {
                let total = disk.total_space();
                let available = disk.available_space();
                DiskMetrics {
                    name: disk.name().to_string_lossy().to_string(),
                    mount_point: disk.mount_point().to_string_lossy().to_string(),
                    total,
                    available,
                    percent_used: percent(total.saturating_sub(available), total),
                }
            })
            .collect()
    }
}

impl ProcessInfo {
    fn collect(sys: &System) -> Self {
        let processes: Vec<_> = sys.processes().values().collect();
        let total_count = processes.len();
        let running_count = processes
            .iter()
            .filter(|p| matches!(p.status(), ProcessStatus::Run))
            .count();

        let entry = |p: &&sysinfo::Process| ProcessEntry {
            pid: p.pid().as_u32(),
            name: p.name().to_string(),
            cpu_percent: p.cpu_usage(),
            memory_bytes: p.memory(),
        };

        let mut cpu_sorted = processes.clone();
        cpu_sorted.sort_by(|a, b| b.cpu_usage().partial_cmp(&a.cpu_usage()).unwrap_or(std::cmp::Ordering::Equal));
        let top_cpu = cpu_sorted.iter().take(TOP_PROCESSES).map(entry).collect();

        let mut mem_sorted = processes;
        mem_sorted.sort_by(|a, b| b.memory().cmp(&a.memory()));
        let top_memory = mem_sorted.iter().take(TOP_PROCESSES).map(entry).collect();

        ProcessInfo {
            total_count,
            running_count,
            top_cpu,
            top_memory,
        }
    }
}

fn percent(part: u64, whole: u64) -> f32 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0) as f32
}

// NaN would serialize as null and break decoding on the master
fn finite(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}
