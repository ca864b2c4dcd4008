/**
 * REGISTRATION CLIENT - Agent side of `register_node`
 *
 * STATES: Unregistered -> Announcing -> Registered, or back to Unregistered
 * when the call fails. There is no lease and no automatic retry: a failed
 * announce waits for the next explicit call (or the next tick of an
 * optional `ReregistrationTask`).
 */

use crate::error::RpcError;
use crate::models::{NodeInfo, RegisterNodeRequest};
use crate::rpc::REGISTER_PATH;
use crate::transport::RpcClient;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Announcing,
    Registered(NodeInfo),
}

#[derive(Clone)]
pub struct RegistrationClient {
    rpc: RpcClient,
    register_url: String,
    request: RegisterNodeRequest,
    state: Arc<Mutex<RegistrationState>>,
}

impl RegistrationClient {
    /// `master_url` is the master's base URL, ex: "http://10.0.0.1:5000"
    pub fn new(rpc: RpcClient, master_url: &str, request: RegisterNodeRequest) -> Self {
        let register_url = format!("{}{}", master_url.trim_end_matches('/'), REGISTER_PATH);
        Self {
            rpc,
            register_url,
            request,
            state: Arc::new(Mutex::new(RegistrationState::Unregistered)),
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.state.lock().clone()
    }

    pub fn request(&self) -> &RegisterNodeRequest {
        &self.request
    }

    /// One registration round trip with the master
    pub async fn announce(&self) -> Result<NodeInfo, RpcError> {
        *self.state.lock() = RegistrationState::Announcing;
        debug!("Announcing to {}", self.register_url);

        match self.rpc.post_json::<_, NodeInfo>(&self.register_url, &self.request).await {
            Ok(node) => {
                info!(
                    "Registered with master as {} ({}:{})",
                    node.name, node.host, node.port
                );
                *self.state.lock() = RegistrationState::Registered(node.clone());
                Ok(node)
            }
            Err(e) => {
                error!("Failed to register to {}: {}", self.register_url, e);
                *self.state.lock() = RegistrationState::Unregistered;
                Err(e)
            }
        }
    }

    /// Announce right away, then every `every` if given
    pub fn spawn_startup(&self, every: Option<Duration>) -> ReregistrationTask {
        self.spawn_loop(true, every)
    }

    /// With `announce_now` false the first call happens one period from now
    fn spawn_loop(&self, announce_now: bool, every: Option<Duration>) -> ReregistrationTask {
        let client = self.clone();
        let (cancel, cancelled) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let announcing = async {
                // failures are already logged by announce
                if announce_now {
                    let _ = client.announce().await;
                }
                let Some(every) = every else { return };
                let mut ticker = interval_at(Instant::now() + every, every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let _ = client.announce().await;
                }
            };

            tokio::select! {
                _ = cancelled => {
                    // an in-flight call was dropped
                    let mut state = client.state.lock();
                    if *state == RegistrationState::Announcing {
                        *state = RegistrationState::Unregistered;
                    }
                    debug!("Periodic registration stopped");
                }
                _ = announcing => {}
            }
        });

        ReregistrationTask { cancel: Some(cancel), handle: Some(handle) }
    }
}

/// Background re-registration loop. Dropping it cancels the loop.
pub struct ReregistrationTask {
    cancel: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ReregistrationTask {
    /// Stop the loop and wait for it to exit
    pub async fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for ReregistrationTask {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}
