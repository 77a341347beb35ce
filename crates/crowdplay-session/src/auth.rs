//! Authorization flow run before every connect.
//!
//! Cached tokens are validated against the socket endpoint and refreshed
//! when rejected. If there are no usable tokens the short-code flow runs:
//! request a code, expose it to the host, poll its status until the user
//! approves, and exchange the approval for a new token pair.

use tokio::time::MissedTickBehavior;

use crate::capability::{ShortCode, ShortCodeStatus, Tokens};
use crate::event::ErrorKind;
use crate::session::{ConnectFailure, Shared};
use crate::state::InteractivityState;

impl Shared {
    /// Produce an access token valid for `url`.
    pub(crate) async fn authorize(&self, url: &str) -> Result<Tokens, ConnectFailure> {
        if let Some(tokens) = self.cached_tokens()
            && let Some(tokens) = self.revalidate(url, tokens).await
        {
            return Ok(tokens);
        }

        let code = self.short_code_flow().await?;
        let tokens = self
            .services
            .auth
            .exchange_code(&self.settings.app_id, &code)
            .await
            .map_err(|e| ConnectFailure::authorization(format!("code exchange failed: {e}")))?;
        self.store_tokens(&tokens);

        let mut core = self.core.lock();
        core.set_short_code(None);
        if core.state() == InteractivityState::ShortCodeRequired {
            core.set_state(InteractivityState::Initializing);
        }
        Ok(tokens)
    }

    fn cached_tokens(&self) -> Option<Tokens> {
        match self.services.tokens.load() {
            Ok(tokens) => tokens,
            Err(e) => {
                self.push_error(ErrorKind::Storage, e.to_string());
                None
            }
        }
    }

    fn store_tokens(&self, tokens: &Tokens) {
        if let Err(e) = self.services.tokens.save(tokens) {
            self.push_error(ErrorKind::Storage, e.to_string());
        }
    }

    /// Validate cached tokens, refreshing them once if the service rejects
    /// the access token. `None` means fall back to the short-code flow.
    async fn revalidate(&self, url: &str, tokens: Tokens) -> Option<Tokens> {
        let probe = self.settings.connect_request(url, &tokens.access_token);
        match self.services.auth.validate_token(&probe).await {
            Ok(true) => {
                tracing::debug!("cached access token accepted");
                Some(tokens)
            }
            Ok(false) => {
                tracing::info!("access token rejected, refreshing");
                match self
                    .services
                    .auth
                    .refresh_tokens(&self.settings.app_id, &tokens.refresh_token)
                    .await
                {
                    Ok(fresh) => {
                        self.store_tokens(&fresh);
                        Some(fresh)
                    }
                    Err(e) => {
                        self.push_error(
                            ErrorKind::Authorization,
                            format!("token refresh failed: {e}"),
                        );
                        None
                    }
                }
            }
            Err(e) => {
                self.push_error(
                    ErrorKind::Authorization,
                    format!("token validation failed: {e}"),
                );
                None
            }
        }
    }

    /// Request short codes until one is approved; returns the exchange code.
    async fn short_code_flow(&self) -> Result<String, ConnectFailure> {
        loop {
            let short_code = self
                .services
                .auth
                .request_short_code(&self.settings.app_id, &self.settings.scope)
                .await
                .map_err(|e| {
                    ConnectFailure::authorization(format!("short code request failed: {e}"))
                })?;
            {
                let mut core = self.core.lock();
                core.set_short_code(Some(short_code.code.clone()));
                core.set_state(InteractivityState::ShortCodeRequired);
            }

            if let Some(code) = self.await_short_code(&short_code).await {
                return Ok(code);
            }
            tracing::info!("short code expired, requesting a new one");
        }
    }

    /// Poll one short code until it is approved (`Some`) or expires (`None`).
    async fn await_short_code(&self, short_code: &ShortCode) -> Option<String> {
        let expiry = tokio::time::sleep(short_code.expires_in);
        tokio::pin!(expiry);
        let mut interval = tokio::time::interval(self.settings.short_code_poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = &mut expiry => return None,
                _ = interval.tick() => {
                    match self.services.auth.check_short_code(&short_code.handle).await {
                        Ok(ShortCodeStatus::Pending) => {}
                        Ok(ShortCodeStatus::Authorized { code }) => return Some(code),
                        Ok(ShortCodeStatus::Expired) => return None,
                        Err(e) => tracing::warn!(error = %e, "short code status check failed"),
                    }
                }
            }
        }
    }
}
