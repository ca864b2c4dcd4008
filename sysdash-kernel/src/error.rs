use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Duration;
use thiserror::Error;

/// Rejected `register_node` call. The registry is never touched when one of
/// these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("malformed registration: {0}")]
    Malformed(String),
    #[error("registration is missing a port")]
    MissingPort,
    #[error("port {0} is outside 1..=65535")]
    InvalidPort(i64),
    #[error("registration host is empty")]
    MissingHost,
    #[error("invalid credentials")]
    Unauthorized,
}

impl RegistrationError {
    pub fn status(&self) -> StatusCode {
        match self {
            RegistrationError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// Outbound call that did not produce a usable answer.
///
/// Callers turn these into a node availability status; they never remove a
/// node from the registry.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },
    #[error("{endpoint} is unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },
    #[error("{endpoint} rejected the call ({status}): {body}")]
    Rejected { endpoint: String, status: u16, body: String },
    #[error("{endpoint} answered with an unexpected payload: {reason}")]
    Protocol { endpoint: String, reason: String },
}

impl RpcError {
    pub(crate) fn from_reqwest(endpoint: &str, timeout: Duration, err: reqwest::Error) -> Self {
        let endpoint = endpoint.to_string();
        if err.is_timeout() {
            RpcError::Timeout { endpoint, timeout }
        } else if err.is_decode() {
            RpcError::Protocol { endpoint, reason: err.to_string() }
        } else if let Some(status) = err.status() {
            RpcError::Rejected { endpoint, status: status.as_u16(), body: err.to_string() }
        } else {
            RpcError::Unreachable { endpoint, reason: err.to_string() }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_error_status() {
        assert_eq!(RegistrationError::MissingPort.status(), StatusCode::BAD_REQUEST);
        assert_eq!(RegistrationError::InvalidPort(0).status(), StatusCode::BAD_REQUEST);
        assert_eq!(RegistrationError::MissingHost.status(), StatusCode::BAD_REQUEST);
        assert_eq!(RegistrationError::Malformed("bad".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(RegistrationError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_rpc_error_messages() {
        let err = RpcError::Rejected {
            endpoint: "http://10.0.0.1:5000/rpc/stats".into(),
            status: 401,
            body: "invalid credentials".into(),
        };
        assert_eq!(
            err.to_string(),
            "http://10.0.0.1:5000/rpc/stats rejected the call (401): invalid credentials"
        );
        assert!(!err.is_timeout());
    }
}
