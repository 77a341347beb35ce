//! REST client for host discovery and the OAuth short-code flow.

use std::time::Duration;

use async_trait::async_trait;
use crowdplay_session::{AuthError, AuthHttpClient, ConnectRequest, ShortCode, ShortCodeStatus, Tokens};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

const HOSTS_PATH: &str = "interactive/hosts";
const SHORT_CODE_PATH: &str = "oauth/shortcode";
const SHORT_CODE_CHECK_PATH: &str = "oauth/shortcode/check/";
const TOKEN_PATH: &str = "oauth/token";

#[derive(Debug, Deserialize)]
struct HostEntry {
    address: String,
}

#[derive(Debug, Deserialize)]
struct ShortCodeResponse {
    code: String,
    handle: String,
    /// Seconds.
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ApprovedResponse {
    code: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

impl From<TokenResponse> for Tokens {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        }
    }
}

fn request_error(e: reqwest::Error) -> AuthError {
    AuthError::Request(e.to_string())
}

/// Turn a non-success response into [`AuthError::Status`].
async fn status_error(response: reqwest::Response) -> AuthError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    AuthError::Status { status, message }
}

async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AuthError> {
    response
        .json()
        .await
        .map_err(|e| AuthError::InvalidResponse(e.to_string()))
}

/// [`AuthHttpClient`] over HTTPS with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    client: reqwest::Client,
    api_base: String,
}

impl HttpAuthClient {
    /// `api_base` is the versioned API root, e.g. `https://mixer.com/api/v1/`.
    pub fn new(api_base: impl Into<String>) -> Self {
        let mut api_base = api_base.into();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }
        Self {
            client: reqwest::Client::new(),
            api_base,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn token_grant(&self, body: serde_json::Value) -> Result<Tokens, AuthError> {
        let response = self
            .client
            .post(self.endpoint(TOKEN_PATH))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        if response.status() != StatusCode::OK {
            return Err(status_error(response).await);
        }
        Ok(parse::<TokenResponse>(response).await?.into())
    }
}

/// The socket endpoint answers plain HTTP on the same path.
fn probe_url(socket_url: &str) -> String {
    if let Some(rest) = socket_url.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = socket_url.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        socket_url.to_string()
    }
}

#[async_trait]
impl AuthHttpClient for HttpAuthClient {
    async fn discover_hosts(&self) -> Result<Vec<String>, AuthError> {
        let response = self
            .client
            .get(self.endpoint(HOSTS_PATH))
            .send()
            .await
            .map_err(request_error)?;
        if response.status() != StatusCode::OK {
            return Err(status_error(response).await);
        }
        let hosts: Vec<HostEntry> = parse(response).await?;
        if hosts.is_empty() {
            return Err(AuthError::NoHosts);
        }
        Ok(hosts.into_iter().map(|h| h.address).collect())
    }

    async fn request_short_code(
        &self,
        client_id: &str,
        scope: &str,
    ) -> Result<ShortCode, AuthError> {
        let body = serde_json::json!({
            "client_id": client_id,
            "scope": scope,
        });
        let response = self
            .client
            .post(self.endpoint(SHORT_CODE_PATH))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        if response.status() != StatusCode::OK {
            return Err(status_error(response).await);
        }
        let data: ShortCodeResponse = parse(response).await?;
        Ok(ShortCode {
            code: data.code,
            handle: data.handle,
            expires_in: Duration::from_secs(data.expires_in),
        })
    }

    async fn check_short_code(&self, handle: &str) -> Result<ShortCodeStatus, AuthError> {
        let response = self
            .client
            .get(self.endpoint(&format!("{SHORT_CODE_CHECK_PATH}{handle}")))
            .send()
            .await
            .map_err(request_error)?;
        match response.status() {
            StatusCode::OK => {
                let data: ApprovedResponse = parse(response).await?;
                Ok(ShortCodeStatus::Authorized { code: data.code })
            }
            StatusCode::NO_CONTENT => Ok(ShortCodeStatus::Pending),
            StatusCode::NOT_FOUND => Ok(ShortCodeStatus::Expired),
            _ => Err(status_error(response).await),
        }
    }

    async fn exchange_code(&self, client_id: &str, code: &str) -> Result<Tokens, AuthError> {
        self.token_grant(serde_json::json!({
            "grant_type": "authorization_code",
            "client_id": client_id,
            "code": code,
        }))
        .await
    }

    async fn refresh_tokens(
        &self,
        client_id: &str,
        refresh_token: &str,
    ) -> Result<Tokens, AuthError> {
        self.token_grant(serde_json::json!({
            "grant_type": "refresh_token",
            "client_id": client_id,
            "refresh_token": refresh_token,
        }))
        .await
    }

    async fn validate_token(&self, probe: &ConnectRequest) -> Result<bool, AuthError> {
        let mut request = self.client.get(probe_url(&probe.url));
        for (name, value) in &probe.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await.map_err(request_error)?;
        match response.status() {
            StatusCode::UNAUTHORIZED => Ok(false),
            // A plain GET against the socket is rejected with 400 once the token is accepted.
            StatusCode::OK | StatusCode::BAD_REQUEST => Ok(true),
            _ => Err(status_error(response).await),
        }
    }
}
