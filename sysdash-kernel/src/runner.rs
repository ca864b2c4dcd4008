/**
 * RUNNER - Owns everything one sysdash process needs
 *
 * BOOT: bind the listener first (so an ephemeral port is known), build the
 * local node and registry from it, seed static peers from the config, then
 * serve. In agent mode the registration client announces once at startup
 * and optionally on a fixed interval.
 */

use crate::config::DashConfig;
use crate::models::RegisterNodeRequest;
use crate::node::{LocalNode, Node};
use crate::proxy::{NodeStatus, RemoteStatsProxy};
use crate::registration::RegistrationClient;
use crate::registry::NodeRegistry;
use crate::rpc::{build_router, AppState};
use crate::transport::RpcClient;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use sysdash_agent_host::discovery::{advertised_host, hostname};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct Runner {
    config: DashConfig,
    registry: Arc<NodeRegistry>,
    proxy: RemoteStatsProxy,
    registration: Option<RegistrationClient>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Runner {
    pub async fn bind(config: DashConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.bind_host.as_str(), config.port))
            .await
            .with_context(|| format!("failed to bind {}:{}", config.bind_host, config.port))?;
        let local_addr = listener.local_addr()?;

        let name = config.register_as.clone().unwrap_or_else(hostname);
        let local = Node::local(name, config.bind_host.clone(), local_addr.port(), LocalNode::new(&config.logs));
        let registry = Arc::new(NodeRegistry::new(local));
        seed_nodes(&registry, &config);

        let rpc = RpcClient::new(config.rpc_timeout(), config.auth.clone())
            .context("failed to build rpc client")?;
        let registration = registration_client(&config, &rpc, local_addr.port());

        Ok(Self {
            proxy: RemoteStatsProxy::new(rpc),
            config,
            registry,
            registration,
            listener,
            local_addr,
        })
    }

    pub fn config(&self) -> &DashConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<NodeRegistry> {
        self.registry.clone()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registration(&self) -> Option<&RegistrationClient> {
        self.registration.as_ref()
    }

    pub fn register_node(&self, name: &str, host: &str, port: u16) -> Node {
        self.registry.register(name, host, port)
    }

    pub fn get_nodes(&self) -> HashMap<String, Node> {
        self.registry.list()
    }

    pub fn get_node(&self, key: &str) -> Option<Node> {
        self.registry.get(key)
    }

    pub fn local_node(&self) -> Node {
        self.registry.local_node()
    }

    /// `None` when `key` is not registered
    pub async fn node_status(&self, key: &str) -> Option<NodeStatus> {
        let node = self.registry.get(key)?;
        Some(self.proxy.status(&node, self.config.rpc_timeout()).await)
    }

    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = build_router(AppState {
            registry: self.registry.clone(),
            proxy: self.proxy.clone(),
            credentials: self.config.auth.clone(),
            stats_timeout: self.config.rpc_timeout(),
        });

        // startup announce plus optional re-announces, stopped with the server
        let announcer = self
            .registration
            .as_ref()
            .map(|client| client.spawn_startup(self.config.register_interval()));

        info!("Listening on http://{}", self.local_addr);
        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;

        if let Some(task) = announcer {
            task.cancel().await;
        }
        info!("Stopped {}", self.local_addr);
        Ok(())
    }
}

fn seed_nodes(registry: &NodeRegistry, config: &DashConfig) {
    for conf in &config.nodes {
        if conf.port == 0 {
            warn!("Skipping configured node {} with port 0", conf.host);
            continue;
        }
        let name = conf.name.as_deref().unwrap_or(&conf.host);
        registry.register(name, &conf.host, conf.port);
    }
}

fn registration_client(config: &DashConfig, rpc: &RpcClient, port: u16) -> Option<RegistrationClient> {
    if !config.agent {
        return None;
    }
    let Some(master) = &config.register_to else {
        warn!("Agent mode without register_to: not registering anywhere");
        return None;
    };

    let request = RegisterNodeRequest {
        name: Some(config.register_as.clone().unwrap_or_else(hostname)),
        host: advertised_host(config.advertise_host.as_deref(), &config.bind_host),
        port: Some(i64::from(port)),
    };
    Some(RegistrationClient::new(rpc.clone(), master, request))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
