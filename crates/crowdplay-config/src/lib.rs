//! Configuration system for the crowdplay session engine.
//!
//! Provides the project identity, service endpoints, timing knobs, and
//! storage locations as settings that persist to disk as RON files.
//! Supports CLI overrides via clap and forward/backward compatible
//! serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE_NAME, Config, DebugConfig, ProjectConfig, ServiceConfig, StorageConfig,
    TimingConfig,
};
pub use error::ConfigError;
