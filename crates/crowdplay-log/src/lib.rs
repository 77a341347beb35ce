//! Structured logging for crowdplay hosts.
//!
//! Installs a `tracing` subscriber with a console layer (uptime timestamps and
//! module paths) and an optional JSON file layer. The filter comes from
//! `RUST_LOG` when set, then from `Config.debug.log_level`, then from
//! [`DEFAULT_FILTER`].

use std::path::Path;

use crowdplay_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter: `info` for crowdplay, quiet transport internals.
pub const DEFAULT_FILTER: &str = "info,tungstenite=warn,tokio_tungstenite=warn,reqwest=warn,hyper=warn";

/// File name of the JSON log written when file logging is enabled.
pub const LOG_FILE_NAME: &str = "crowdplay.log";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file
/// * `file_logging` - whether to write the JSON log at all
/// * `config` - optional configuration supplying the log level
///
/// Calling this twice panics inside `tracing-subscriber`; hosts call it once
/// at startup.
///
/// ```no_run
/// use crowdplay_config::Config;
/// use crowdplay_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, file_logging: bool, config: Option<&Config>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_string(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if file_logging
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Create an `EnvFilter` with [`DEFAULT_FILTER`].
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

/// Filter directive string for the given config.
///
/// Short level names are widened so that noisy dependencies stay at `warn`.
pub fn filter_string(config: Option<&Config>) -> String {
    let level = config
        .map(|c| c.debug.log_level.trim())
        .filter(|level| !level.is_empty());

    match level {
        None => DEFAULT_FILTER.to_string(),
        Some(level) if level.contains(',') || level.contains('=') => level.to_string(),
        Some(level) => format!("{level},tungstenite=warn,tokio_tungstenite=warn,reqwest=warn,hyper=warn"),
    }
}
