//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the persisted configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "crowdplay.ron";

/// Top-level session configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Identity of the interactive project on the service.
    pub project: ProjectConfig,
    /// Service endpoints and protocol version.
    pub service: ServiceConfig,
    /// Poll and reconnect intervals.
    pub timing: TimingConfig,
    /// Where cached credentials live.
    pub storage: StorageConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Project identity. Both ids are required before a session can initialize.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    /// OAuth client id of the application.
    pub app_id: String,
    /// Version id of the interactive project (sent as `X-Interactive-Version`).
    pub project_version_id: String,
    /// OAuth scope requested with the short code.
    pub scope: String,
}

/// Service endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the REST API, with trailing slash.
    pub api_base: String,
    /// Value of the `X-Protocol-Version` handshake header.
    pub protocol_version: String,
    /// Fixed socket URL. Empty means discover it through the hosts endpoint.
    pub socket_url: String,
}

/// Timing knobs, all in milliseconds on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    /// Interval between short-code status checks.
    pub short_code_poll_interval_ms: u64,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_interval_ms: u64,
    /// How often the demo host calls `poll` per second.
    pub frame_rate: u32,
}

/// Credential storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// File name of the cached token pair.
    pub token_file: String,
    /// Directory override. Empty means the platform data directory.
    pub data_dir: String,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter override (e.g., "debug", "info,crowdplay_session=trace").
    pub log_level: String,
    /// Trace every inbound and outbound frame.
    pub log_frames: bool,
    /// Also write JSON logs next to the token file.
    pub file_logging: bool,
}

// --- Default implementations ---

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            project_version_id: String::new(),
            scope: "interactive:robot:self".to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base: "https://mixer.com/api/v1/".to_string(),
            protocol_version: "2.0".to_string(),
            socket_url: String::new(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            short_code_poll_interval_ms: 500,
            reconnect_interval_ms: 500,
            frame_rate: 60,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_file: "crowdplay_tokens.json".to_string(),
            data_dir: String::new(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_frames: false,
            file_logging: false,
        }
    }
}

// --- Derived values ---

impl TimingConfig {
    /// Short-code status poll interval.
    pub fn short_code_poll_interval(&self) -> Duration {
        Duration::from_millis(self.short_code_poll_interval_ms)
    }

    /// Reconnect delay.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Delay between two host frames. A zero frame rate falls back to 60.
    pub fn frame_interval(&self) -> Duration {
        let rate = if self.frame_rate == 0 { 60 } else { self.frame_rate };
        Duration::from_secs(1) / rate
    }
}

impl ProjectConfig {
    /// Whether both ids needed to open a session are present.
    pub fn is_complete(&self) -> bool {
        !self.app_id.trim().is_empty() && !self.project_version_id.trim().is_empty()
    }
}

impl Config {
    /// Platform config directory for crowdplay (`<config_dir>/crowdplay`).
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("crowdplay"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Directory holding the token cache and file logs.
    pub fn data_dir(&self) -> PathBuf {
        if !self.storage.data_dir.is_empty() {
            return PathBuf::from(&self.storage.data_dir);
        }
        dirs::data_dir()
            .map(|dir| dir.join("crowdplay"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Full path of the cached token pair.
    pub fn token_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.token_file)
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `crowdplay.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(2)
            .enumerate_arrays(false);

        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(2))
                .unwrap();
        assert!(ron_str.contains("protocol_version: \"2.0\""));
        assert!(ron_str.contains("short_code_poll_interval_ms: 500"));
    }

    #[test]
    fn test_defaults_match_service_contract() {
        let config = Config::default();
        assert_eq!(config.project.scope, "interactive:robot:self");
        assert_eq!(config.timing.reconnect_interval(), Duration::from_millis(500));
        assert_eq!(config.timing.short_code_poll_interval(), Duration::from_millis(500));
        assert!(config.service.api_base.ends_with('/'));
        assert!(!config.project.is_complete());
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(project: (app_id: \"abc\", project_version_id: \"42\"))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.project.app_id, "abc");
        assert_eq!(config.project.scope, "interactive:robot:self");
        assert_eq!(config.timing, TimingConfig::default());
        assert!(config.project.is_complete());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.project.app_id = "client-1".to_string();
        config.project.project_version_id = "1234".to_string();
        config.timing.reconnect_interval_ms = 250;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_invalid_ron_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{{not valid}}").unwrap();
        let err = Config::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_token_path_honours_data_dir_override() {
        let mut config = Config::default();
        config.storage.data_dir = "/tmp/crowdplay-test".to_string();
        assert_eq!(
            config.token_path(),
            PathBuf::from("/tmp/crowdplay-test/crowdplay_tokens.json")
        );
    }

    #[test]
    fn test_frame_interval_never_divides_by_zero() {
        let mut timing = TimingConfig::default();
        timing.frame_rate = 0;
        assert_eq!(timing.frame_interval(), Duration::from_secs(1) / 60);
    }
}
