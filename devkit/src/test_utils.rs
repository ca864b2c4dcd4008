/*!
Test harness for sysdash nodes

Every node binds `127.0.0.1:0`, so tests can run in parallel. A node runs
until `shutdown()` is called or the `SpawnedNode` is dropped.
*/

use anyhow::{bail, Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use sysdash_kernel::{
    Credentials, DashConfig, Node, NodeInfo, NodeRegistry, RegistrationClient, RegistrationState, Runner,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);
const POLL_EVERY: Duration = Duration::from_millis(20);

/// A running master or agent
pub struct SpawnedNode {
    addr: SocketAddr,
    registry: Arc<NodeRegistry>,
    registration: Option<RegistrationClient>,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<Result<()>>>,
}

impl SpawnedNode {
    pub async fn start(config: DashConfig) -> Result<Self> {
        let runner = Runner::bind(config).await?;
        let addr = runner.local_addr();
        let registry = runner.registry();
        let registration = runner.registration().cloned();

        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(runner.run_until(async move {
            let _ = rx.await;
        }));
        log::info!("Spawned node on {}", addr);

        Ok(Self {
            addr,
            registry,
            registration,
            shutdown: Some(tx),
            server: Some(server),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Key this node gets in a master's registry when it registers from loopback
    pub fn loopback_key(&self) -> String {
        format!("127.0.0.1:{}", self.port())
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn registration(&self) -> Option<&RegistrationClient> {
        self.registration.as_ref()
    }

    /// Poll the registry until `key` shows up
    pub async fn wait_for_node(&self, key: &str, timeout: Duration) -> Result<Node> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(node) = self.registry.get(key) {
                return Ok(node);
            }
            if Instant::now() >= deadline {
                bail!("node {} did not register with {} within {:?}", key, self.addr, timeout);
            }
            sleep(POLL_EVERY).await;
        }
    }

    /// Agent side: poll until the startup announce succeeded
    pub async fn wait_registered(&self, timeout: Duration) -> Result<NodeInfo> {
        let client = self.registration.as_ref().context("node is not an agent")?;
        let deadline = Instant::now() + timeout;
        loop {
            if let RegistrationState::Registered(info) = client.state() {
                return Ok(info);
            }
            if Instant::now() >= deadline {
                bail!("agent {} still {:?} after {:?}", self.addr, client.state(), timeout);
            }
            sleep(POLL_EVERY).await;
        }
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server.await??;
        }
        log::info!("Stopped node on {}", self.addr);
        Ok(())
    }
}

impl Drop for SpawnedNode {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Builds configs and talks HTTP to spawned nodes
pub struct TestHarness {
    credentials: Option<Credentials>,
    http: reqwest::Client,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::try_init().ok();
        Self { credentials: None, http: reqwest::Client::new() }
    }

    /// Every node started from this harness, and every request it sends,
    /// uses these credentials
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn master_config(&self) -> DashConfig {
        DashConfig {
            bind_host: "127.0.0.1".into(),
            port: 0,
            auth: self.credentials.clone(),
            rpc_timeout_secs: 2,
            ..DashConfig::default()
        }
    }

    pub fn agent_config(&self, master: &SpawnedNode, register_as: Option<&str>) -> DashConfig {
        DashConfig {
            agent: true,
            register_to: Some(master.base_url()),
            register_as: register_as.map(str::to_string),
            ..self.master_config()
        }
    }

    pub async fn start_master(&self) -> Result<SpawnedNode> {
        SpawnedNode::start(self.master_config()).await
    }

    pub async fn start_agent(&self, master: &SpawnedNode, register_as: Option<&str>) -> Result<SpawnedNode> {
        SpawnedNode::start(self.agent_config(master, register_as)).await
    }

    /// GET `path` on `node`; returns the status and the JSON body (Null when
    /// the body is not JSON)
    pub async fn get(&self, node: &SpawnedNode, path: &str) -> Result<(StatusCode, Value)> {
        self.get_as(node, path, self.credentials.as_ref()).await
    }

    pub async fn get_as(
        &self,
        node: &SpawnedNode,
        path: &str,
        credentials: Option<&Credentials>,
    ) -> Result<(StatusCode, Value)> {
        let mut request = self.http.get(format!("{}{}", node.base_url(), path)).timeout(DEFAULT_WAIT);
        if let Some(creds) = credentials {
            request = request.header(AUTHORIZATION, creds.to_basic_header());
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, serde_json::from_slice(&body).unwrap_or(Value::Null)))
    }

    pub async fn post(&self, node: &SpawnedNode, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
        self.post_raw(node, path, "application/json", body.to_string()).await
    }

    /// POST an arbitrary body, for requests a well-behaved client never sends
    pub async fn post_raw(
        &self,
        node: &SpawnedNode,
        path: &str,
        content_type: &str,
        body: String,
    ) -> Result<(StatusCode, Value)> {
        let mut request = self
            .http
            .post(format!("{}{}", node.base_url(), path))
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .timeout(DEFAULT_WAIT);
        if let Some(creds) = &self.credentials {
            request = request.header(AUTHORIZATION, creds.to_basic_header());
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, serde_json::from_slice(&body).unwrap_or(Value::Null)))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_harness_starts_and_stops_a_master() {
        let harness = TestHarness::new();
        let master = harness.start_master().await.unwrap();
        assert_ne!(master.port(), 0);
        assert_eq!(master.registry().len(), 1);

        let (status, body) = harness.get(&master, "/api/nodes").await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        master.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_missing_node_times_out() {
        let harness = TestHarness::new();
        let master = harness.start_master().await.unwrap();
        let err = master
            .wait_for_node("127.0.0.1:1", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not register"));
    }
}
