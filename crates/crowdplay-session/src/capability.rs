//! Capabilities the session needs from its platform.
//!
//! The session never performs I/O itself. It is handed a [`Transport`] for
//! the persistent socket, an [`AuthHttpClient`] for the REST endpoints used
//! during authorization, and a [`TokenStore`] for the cached credentials.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Where and how to open the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    /// Handshake headers, in order.
    pub headers: Vec<(String, String)>,
}

impl ConnectRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Callbacks a transport invokes from its I/O context.
pub trait TransportListener: Send + Sync {
    /// The socket is open and ready for [`Transport::send`].
    fn on_open(&self);
    /// One text frame arrived.
    fn on_message(&self, text: &str);
    /// The socket closed. Not called for closes requested with [`Transport::close`].
    fn on_close(&self, reason: Option<String>);
}

/// A message-oriented, text-frame connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection, replacing any previous one. Must call
    /// [`TransportListener::on_open`] once the socket is usable.
    async fn connect(
        &self,
        request: ConnectRequest,
        listener: Arc<dyn TransportListener>,
    ) -> Result<(), TransportError>;

    /// Queue one text frame. Never blocks.
    fn send(&self, text: String) -> Result<(), TransportError>;

    /// Close the current connection, if any.
    fn close(&self);
}

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    Send(String),
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// Access/refresh token pair. Serialized with the key names of the cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    #[serde(rename = "AuthToken")]
    pub access_token: String,
    #[serde(rename = "RefreshToken")]
    pub refresh_token: String,
}

/// A short code issued for the device-authorization flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortCode {
    /// What the user types on the companion website.
    pub code: String,
    /// Opaque handle used to check the code's status.
    pub handle: String,
    /// Lifetime of the code from the moment it was issued.
    pub expires_in: Duration,
}

/// Status of a short code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortCodeStatus {
    /// The user has not entered the code yet.
    Pending,
    /// The user approved; `code` can be exchanged for tokens.
    Authorized { code: String },
    /// The service no longer knows the code.
    Expired,
}

/// REST endpoints used to find a socket host and obtain tokens.
#[async_trait]
pub trait AuthHttpClient: Send + Sync {
    /// Candidate socket URLs, best first.
    async fn discover_hosts(&self) -> Result<Vec<String>, AuthError>;

    async fn request_short_code(&self, client_id: &str, scope: &str)
    -> Result<ShortCode, AuthError>;

    async fn check_short_code(&self, handle: &str) -> Result<ShortCodeStatus, AuthError>;

    /// Authorization-code grant.
    async fn exchange_code(&self, client_id: &str, code: &str) -> Result<Tokens, AuthError>;

    /// Refresh-token grant.
    async fn refresh_tokens(&self, client_id: &str, refresh_token: &str)
    -> Result<Tokens, AuthError>;

    /// Lightweight probe of the socket endpoint with the handshake headers.
    /// `Ok(false)` means the token was rejected.
    async fn validate_token(&self, probe: &ConnectRequest) -> Result<bool, AuthError>;
}

/// Authorization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The request never produced a response.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The service answered with an unexpected status.
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Host discovery returned an empty list.
    #[error("no interactive hosts available")]
    NoHosts,
}

// ---------------------------------------------------------------------------
// Token storage
// ---------------------------------------------------------------------------

/// Persistence for the cached token pair.
pub trait TokenStore: Send + Sync {
    /// `Ok(None)` when nothing is cached.
    fn load(&self) -> Result<Option<Tokens>, StorageError>;
    /// Overwrite the cached pair.
    fn save(&self, tokens: &Tokens) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// Token storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt token cache {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode tokens: {0}")]
    Encode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = ConnectRequest {
            url: "wss://example".to_string(),
            headers: vec![("Authorization".to_string(), "Bearer t".to_string())],
        };
        assert_eq!(request.header("authorization"), Some("Bearer t"));
        assert_eq!(request.header("X-Protocol-Version"), None);
    }

    #[test]
    fn test_tokens_use_cache_key_names() {
        let tokens = Tokens {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };
        let json = serde_json::to_value(&tokens).unwrap();
        assert_eq!(json, serde_json::json!({"AuthToken": "a", "RefreshToken": "r"}));
    }

    #[test]
    fn test_auth_error_display() {
        let err = AuthError::Status {
            status: 401,
            message: "invalid_grant".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected status 401: invalid_grant");
    }
}
