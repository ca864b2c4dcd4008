/**
 * REMOTE STATS PROXY - Master side of `get_stats`
 *
 * On demand only: nothing is cached or pushed. A failed call marks the node
 * unavailable for this request and leaves the registry alone, so a node can
 * be known but currently unreachable.
 */

use crate::error::RpcError;
use crate::node::Node;
use crate::rpc::STATS_PATH;
use crate::transport::RpcClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use sysdash_agent_host::NodeSnapshot;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum NodeStatus {
    Available { snapshot: Box<NodeSnapshot> },
    Unavailable { reason: String },
}

impl NodeStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, NodeStatus::Available { .. })
    }
}

impl From<RpcError> for NodeStatus {
    fn from(err: RpcError) -> Self {
        NodeStatus::Unavailable { reason: err.to_string() }
    }
}

#[derive(Clone)]
pub struct RemoteStatsProxy {
    rpc: RpcClient,
}

impl RemoteStatsProxy {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    /// Ask `node` for its current snapshot
    pub async fn fetch(&self, node: &Node, timeout: Duration) -> Result<NodeSnapshot, RpcError> {
        let url = format!("{}{}", node.base_url(), STATS_PATH);
        self.rpc.get_json(&url, timeout).await
    }

    /// Snapshot of any node: read in place for the local node, fetched
    /// remotely for everyone else
    pub async fn status(&self, node: &Node, timeout: Duration) -> NodeStatus {
        if let Some(local) = node.local_metrics() {
            return match local.snapshot().await {
                Ok(snapshot) => NodeStatus::Available { snapshot: Box::new(snapshot) },
                Err(e) => NodeStatus::Unavailable { reason: e.to_string() },
            };
        }

        match self.fetch(node, timeout).await {
            Ok(snapshot) => NodeStatus::Available { snapshot: Box::new(snapshot) },
            Err(e) => {
                warn!("Node {} unavailable: {}", node.key(), e);
                e.into()
            }
        }
    }
}
