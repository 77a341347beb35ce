//! Values the session reads from [`Config`] once at construction.

use std::time::Duration;

use crowdplay_config::Config;

use crate::capability::ConnectRequest;

/// Immutable session parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub app_id: String,
    pub project_version_id: String,
    pub scope: String,
    pub protocol_version: String,
    /// Fixed socket URL; `None` means discover one.
    pub socket_url: Option<String>,
    pub short_code_poll_interval: Duration,
    pub reconnect_interval: Duration,
    /// Trace every frame in and out.
    pub log_frames: bool,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        let socket_url = config.service.socket_url.trim();
        Self {
            app_id: config.project.app_id.trim().to_string(),
            project_version_id: config.project.project_version_id.trim().to_string(),
            scope: config.project.scope.clone(),
            protocol_version: config.service.protocol_version.clone(),
            socket_url: (!socket_url.is_empty()).then(|| socket_url.to_string()),
            short_code_poll_interval: config
                .timing
                .short_code_poll_interval()
                .max(Duration::from_millis(1)),
            reconnect_interval: config.timing.reconnect_interval(),
            log_frames: config.debug.log_frames,
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.app_id.is_empty() && !self.project_version_id.is_empty()
    }

    /// Handshake request carrying the bearer token and version headers.
    pub fn connect_request(&self, url: &str, access_token: &str) -> ConnectRequest {
        ConnectRequest {
            url: url.to_string(),
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {access_token}")),
                (
                    "X-Interactive-Version".to_string(),
                    self.project_version_id.clone(),
                ),
                (
                    "X-Protocol-Version".to_string(),
                    self.protocol_version.clone(),
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.project.app_id = " app ".to_string();
        config.project.project_version_id = "55".to_string();
        let settings = SessionSettings::from_config(&config);
        assert_eq!(settings.app_id, "app");
        assert!(settings.socket_url.is_none());
        assert!(settings.is_complete());
        assert_eq!(settings.reconnect_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_connect_request_headers() {
        let mut config = Config::default();
        config.project.project_version_id = "55".to_string();
        config.service.socket_url = "wss://fixed".to_string();
        let settings = SessionSettings::from_config(&config);
        let request = settings.connect_request("wss://fixed", "tok");
        assert_eq!(settings.socket_url.as_deref(), Some("wss://fixed"));
        assert_eq!(request.header("Authorization"), Some("Bearer tok"));
        assert_eq!(request.header("X-Interactive-Version"), Some("55"));
        assert_eq!(request.header("X-Protocol-Version"), Some("2.0"));
    }
}
