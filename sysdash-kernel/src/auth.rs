/**
 * AUTH - Optional HTTP Basic credentials on every RPC and API route
 *
 * - `/health` is always reachable
 * - no configured credentials means the node is open
 * - outbound calls attach the process's own pair (see transport.rs)
 */

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use crate::error::RegistrationError;
use crate::rpc::REGISTER_PATH;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    /// Decode an `Authorization: Basic ...` header value
    pub fn from_basic_header(value: &str) -> Option<Self> {
        let encoded = value.strip_prefix("Basic ").or_else(|| value.strip_prefix("basic "))?;
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Self::new(username, password))
    }

    pub fn to_basic_header(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", self.username, self.password)))
    }
}

pub async fn require_basic_auth(
    State(expected): State<Option<Credentials>>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let Some(expected) = expected else {
        return Ok(next.run(req).await);
    };

    if req.uri().path().starts_with("/health") {
        return Ok(next.run(req).await);
    }

    let ok = req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(Credentials::from_basic_header)
        .map(|given| given == expected)
        .unwrap_or(false);

    if !ok {
        warn!("Rejected unauthenticated call to {}", req.uri().path());
        if req.uri().path() == REGISTER_PATH {
            return Err(RegistrationError::Unauthorized.into_response());
        }
        return Err(StatusCode::UNAUTHORIZED.into_response());
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header_roundtrip() {
        let creds = Credentials::new("user", "pass");
        let header = creds.to_basic_header();
        assert_eq!(header, "Basic dXNlcjpwYXNz");
        assert_eq!(Credentials::from_basic_header(&header), Some(creds));
    }

    #[test]
    fn test_password_may_contain_colon() {
        let creds = Credentials::new("user", "p:a:ss");
        assert_eq!(Credentials::from_basic_header(&creds.to_basic_header()), Some(creds));
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(Credentials::from_basic_header("Bearer abc"), None);
        assert_eq!(Credentials::from_basic_header("Basic !!!"), None);
        // "nocolon" base64-encoded
        assert_eq!(Credentials::from_basic_header("Basic bm9jb2xvbg=="), None);
    }

    #[test]
    fn test_debug_hides_password() {
        let shown = format!("{:?}", Credentials::new("user", "secret"));
        assert!(shown.contains("user"));
        assert!(!shown.contains("secret"));
    }
}
