/**
 * NODE - One participant of the dashboard
 *
 * ROLE: identity (name, host, port, last registration) shared by every node,
 * plus the live sampling state that only the local node carries.
 *
 * MODEL: a plain record with an optional `LocalNode` field. Callers check
 * `local_metrics()` instead of asking what kind of node they hold.
 */

use crate::models::NodeInfo;
use anyhow::Result;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use sysdash_agent_host::{InterfaceRate, LogSources, NetIoCounters, NodeSnapshot};
use time::OffsetDateTime;

/// Registry key for a node: `host:port`
pub fn node_key(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}

pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub last_registered: i64,
    local: Option<Arc<LocalNode>>,
}

impl Node {
    pub fn remote(name: impl Into<String>, host: impl Into<String>, port: u16, last_registered: i64) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            last_registered,
            local: None,
        }
    }

    pub fn local(name: impl Into<String>, host: impl Into<String>, port: u16, local: LocalNode) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            last_registered: unix_now(),
            local: Some(Arc::new(local)),
        }
    }

    pub fn key(&self) -> String {
        node_key(&self.host, self.port)
    }

    pub fn is_local(&self) -> bool {
        self.local.is_some()
    }

    pub fn local_metrics(&self) -> Option<&Arc<LocalNode>> {
        self.local.as_ref()
    }

    /// Base URL of the node's RPC endpoint
    pub fn base_url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("http://[{}]:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            host: self.host.clone(),
            port: self.port,
            name: self.name.clone(),
            last_registered: self.last_registered,
        }
    }
}

/// Sampling state owned by the process's own node
pub struct LocalNode {
    logs: RwLock<LogSources>,
    net_io_counters: Mutex<NetIoCounters>,
}

impl LocalNode {
    pub fn new<S: AsRef<str>>(log_patterns: &[S]) -> Self {
        let mut logs = LogSources::new();
        logs.add_patterns(log_patterns);
        Self {
            logs: RwLock::new(logs),
            net_io_counters: Mutex::new(NetIoCounters::new()),
        }
    }

    pub fn log_files(&self) -> Vec<PathBuf> {
        self.logs.read().available()
    }

    /// Re-scan log patterns; returns how many new files appeared
    pub fn reload_logs<S: AsRef<str>>(&self, patterns: &[S]) -> usize {
        self.logs.write().add_patterns(patterns)
    }

    pub fn update_net_io_counters(&self) -> BTreeMap<String, InterfaceRate> {
        self.net_io_counters.lock().update()
    }

    /// Fresh metrics snapshot of this machine
    pub async fn snapshot(&self) -> Result<NodeSnapshot> {
        // lock released before the collection awaits
        let rates = self.update_net_io_counters();
        NodeSnapshot::collect(rates).await
    }
}

impl fmt::Debug for LocalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalNode")
            .field("logs", &self.logs.read().len())
            .finish_non_exhaustive()
    }
}
