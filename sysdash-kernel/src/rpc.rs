/**
 * RPC SERVER - HTTP surface of a sysdash node
 *
 * ROUTES:
 * - POST /rpc/register_node  idempotent upsert of the caller into the registry
 * - GET  /rpc/stats          this node's current metrics snapshot
 * - GET  /api/nodes[/{key}[/stats]]  read API for the presentation layer
 * - GET  /health             liveness, never authenticated
 *
 * SECURITY: optional HTTP Basic credentials checked by middleware before any
 * handler runs (see auth.rs).
 */

use crate::auth::{require_basic_auth, Credentials};
use crate::error::RegistrationError;
use crate::models::{NodeInfo, RegisterNodeRequest};
use crate::node::Node;
use crate::proxy::{NodeStatus, RemoteStatsProxy};
use crate::registry::NodeRegistry;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use sysdash_agent_host::NodeSnapshot;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{error, info};

pub const REGISTER_PATH: &str = "/rpc/register_node";
pub const STATS_PATH: &str = "/rpc/stats";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<NodeRegistry>,
    pub proxy: RemoteStatsProxy,
    pub credentials: Option<Credentials>,
    pub stats_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    pub key: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub last_registered: i64,
    pub last_registered_at: String,  // RFC3339
    pub local: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatusView {
    pub node: NodeView,
    #[serde(flatten)]
    pub status: NodeStatus,
}

fn to_view(node: &Node) -> NodeView {
    let last_registered_at = OffsetDateTime::from_unix_timestamp(node.last_registered)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_default();
    NodeView {
        key: node.key(),
        name: node.name.clone(),
        host: node.host.clone(),
        port: node.port,
        last_registered: node.last_registered,
        last_registered_at,
        local: node.is_local(),
    }
}

pub fn build_router(app_state: AppState) -> Router {
    let credentials = app_state.credentials.clone();
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(REGISTER_PATH, post(register_node))
        .route(STATS_PATH, get(get_stats))
        .route("/api/nodes", get(list_nodes))
        .route("/api/nodes/{key}", get(get_node))
        .route("/api/nodes/{key}/stats", get(node_stats))
        .with_state(app_state)
        .layer(middleware::from_fn_with_state(credentials, require_basic_auth))
}

/// Validate a registration and upsert it. Nothing is written on error.
pub fn handle_registration(
    registry: &NodeRegistry,
    req: RegisterNodeRequest,
    peer: IpAddr,
) -> Result<Node, RegistrationError> {
    let port = match req.port {
        None => return Err(RegistrationError::MissingPort),
        Some(p) if (1..=i64::from(u16::MAX)).contains(&p) => p as u16,
        Some(p) => return Err(RegistrationError::InvalidPort(p)),
    };

    let host = match req.host {
        Some(host) => host.trim().to_string(),
        None => peer.to_canonical().to_string(),
    };
    if host.is_empty() {
        return Err(RegistrationError::MissingHost);
    }

    let name = req.name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| host.clone());

    Ok(registry.register(&name, &host, port))
}

// POST /rpc/register_node
async fn register_node(
    State(app): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Result<Json<RegisterNodeRequest>, JsonRejection>,
) -> Result<Json<NodeInfo>, RegistrationError> {
    let node = body
        .map_err(|rejection| RegistrationError::Malformed(rejection.body_text()))
        .and_then(|Json(req)| handle_registration(&app.registry, req, peer.ip()))
        .map_err(|e| {
            info!("Rejected registration from {}: {}", peer, e);
            e
        })?;
    Ok(Json(node.info()))
}

// GET /rpc/stats
async fn get_stats(State(app): State<AppState>) -> Result<Json<NodeSnapshot>, (StatusCode, String)> {
    let local = app.registry.local_node();
    let Some(metrics) = local.local_metrics() else {
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "no local metrics".into()));
    };
    match metrics.snapshot().await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => {
            error!("Failed to collect local snapshot: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

// GET /api/nodes
async fn list_nodes(State(app): State<AppState>) -> Json<Vec<NodeView>> {
    let mut list: Vec<NodeView> = app.registry.list().values().map(to_view).collect();
    list.sort_by(|a, b| a.key.cmp(&b.key));
    Json(list)
}

// GET /api/nodes/{key}
async fn get_node(
    State(app): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<NodeView>, StatusCode> {
    let node = app.registry.get(&key).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(to_view(&node)))
}

// GET /api/nodes/{key}/stats
async fn node_stats(
    State(app): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<NodeStatusView>, StatusCode> {
    let node = app.registry.get(&key).ok_or(StatusCode::NOT_FOUND)?;
    let status = app.proxy.status(&node, app.stats_timeout).await;
    Ok(Json(NodeStatusView { node: to_view(&node), status }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LocalNode;
    use std::net::Ipv4Addr;

    fn registry() -> NodeRegistry {
        let empty: [&str; 0] = [];
        NodeRegistry::new(Node::local("master", "0.0.0.0", 5000, LocalNode::new(&empty)))
    }

    fn loopback() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    #[test]
    fn test_register_uses_peer_address_when_host_missing() {
        let reg = registry();
        let req = RegisterNodeRequest { name: Some("the_agent".into()), host: None, port: Some(5001) };
        let node = handle_registration(&reg, req, loopback()).unwrap();
        assert_eq!(node.key(), "127.0.0.1:5001");
        assert_eq!(reg.get("127.0.0.1:5001").unwrap().name, "the_agent");
    }

    #[test]
    fn test_register_defaults_name_to_host() {
        let reg = registry();
        let req = RegisterNodeRequest { name: Some("  ".into()), host: Some("10.0.0.1".into()), port: Some(5000) };
        let node = handle_registration(&reg, req, loopback()).unwrap();
        assert_eq!(node.name, "10.0.0.1");
        assert_eq!(node.host, "10.0.0.1");
    }

    #[test]
    fn test_ipv4_mapped_peer_is_canonicalized() {
        let reg = registry();
        let mapped: IpAddr = "::ffff:127.0.0.1".parse().unwrap();
        let req = RegisterNodeRequest { name: None, host: None, port: Some(5001) };
        let node = handle_registration(&reg, req, mapped).unwrap();
        assert_eq!(node.host, "127.0.0.1");
    }

    #[test]
    fn test_malformed_registrations_leave_registry_untouched() {
        let reg = registry();
        let cases = [
            (RegisterNodeRequest { name: None, host: Some("h".into()), port: None }, RegistrationError::MissingPort),
            (RegisterNodeRequest { name: None, host: Some("h".into()), port: Some(0) }, RegistrationError::InvalidPort(0)),
            (RegisterNodeRequest { name: None, host: Some("h".into()), port: Some(70000) }, RegistrationError::InvalidPort(70000)),
            (RegisterNodeRequest { name: None, host: Some(" ".into()), port: Some(5000) }, RegistrationError::MissingHost),
        ];
        for (req, expected) in cases {
            assert_eq!(handle_registration(&reg, req, loopback()).unwrap_err(), expected);
        }
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_view_formats_timestamp() {
        let node = Node::remote("node-a", "10.0.0.1", 5000, 0);
        let view = to_view(&node);
        assert_eq!(view.key, "10.0.0.1:5000");
        assert_eq!(view.last_registered_at, "1970-01-01T00:00:00Z");
        assert!(!view.local);
    }
}
