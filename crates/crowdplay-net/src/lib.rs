//! Production capabilities for `crowdplay-session`.
//!
//! - [`WebSocketTransport`]: the persistent socket, over `tokio-tungstenite`.
//! - [`HttpAuthClient`]: host discovery and OAuth short-code endpoints, over `reqwest`.

mod auth_client;
mod transport;

pub use auth_client::HttpAuthClient;
pub use transport::WebSocketTransport;
