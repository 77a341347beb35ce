//! Command-line argument parsing for crowdplay hosts.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// crowdplay command-line arguments.
///
/// CLI values override settings loaded from `crowdplay.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "crowdplay", about = "Interactive audience session host")]
pub struct CliArgs {
    /// OAuth client id.
    #[arg(long)]
    pub app_id: Option<String>,

    /// Interactive project version id.
    #[arg(long)]
    pub project_version_id: Option<String>,

    /// REST API base URL.
    #[arg(long)]
    pub api_base: Option<String>,

    /// Connect to this socket URL instead of discovering one.
    #[arg(long)]
    pub socket_url: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Connect but do not go interactive automatically.
    #[arg(long)]
    pub no_interactive: bool,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref id) = args.app_id {
            self.project.app_id = id.clone();
        }
        if let Some(ref id) = args.project_version_id {
            self.project.project_version_id = id.clone();
        }
        if let Some(ref base) = args.api_base {
            self.service.api_base = base.clone();
        }
        if let Some(ref url) = args.socket_url {
            self.service.socket_url = url.clone();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            app_id: Some("client-9".to_string()),
            socket_url: Some("wss://localhost:9000".to_string()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.project.app_id, "client-9");
        assert_eq!(config.service.socket_url, "wss://localhost:9000");
        assert_eq!(config.service.protocol_version, "2.0");
        assert!(config.project.project_version_id.is_empty());
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from([
            "crowdplay",
            "--app-id",
            "abc",
            "--project-version-id",
            "77",
            "--no-interactive",
        ]);
        assert_eq!(args.app_id.as_deref(), Some("abc"));
        assert_eq!(args.project_version_id.as_deref(), Some("77"));
        assert!(args.no_interactive);
        assert!(args.config.is_none());
    }
}
