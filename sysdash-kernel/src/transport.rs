//! HTTP+JSON request/response transport for node-to-node calls.
//!
//! Every call carries a bounded timeout and the process's credentials.

use crate::auth::Credentials;
use crate::error::RpcError;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct RpcClient {
    http: Client,
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(timeout: Duration, credentials: Option<Credentials>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { http, credentials, timeout })
    }

    pub async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, RpcError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(url, self.http.post(url).json(body), self.timeout).await
    }

    pub async fn get_json<R: DeserializeOwned>(&self, url: &str, timeout: Duration) -> Result<R, RpcError> {
        self.send(url, self.http.get(url), timeout).await
    }

    async fn send<R: DeserializeOwned>(
        &self,
        url: &str,
        mut request: RequestBuilder,
        timeout: Duration,
    ) -> Result<R, RpcError> {
        if let Some(creds) = &self.credentials {
            request = request.header(AUTHORIZATION, creds.to_basic_header());
        }

        debug!("RPC call to {} (timeout {:?})", url, timeout);
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Rejected {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RpcError::from_reqwest(url, timeout, e))?;
        serde_json::from_slice(&bytes).map_err(|e| RpcError::Protocol {
            endpoint: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // grab a free port, then close it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = RpcClient::new(Duration::from_secs(2), None).unwrap();
        let err = client
            .get_json::<serde_json::Value>(&format!("http://{}/rpc/stats", addr), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Unreachable { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        // accepts connections but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                sockets.push(socket);
            }
        });

        let client = RpcClient::new(Duration::from_secs(5), None).unwrap();
        let started = std::time::Instant::now();
        let err = client
            .get_json::<serde_json::Value>(&format!("http://{}/rpc/stats", addr), Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "got {:?}", err);
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
