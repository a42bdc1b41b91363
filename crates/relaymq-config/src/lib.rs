//! Minimal configuration loading for relaymq.
//!
//! One flat struct, trimmed down from the Hootenanny config split
//! (infra/bootstrap) since a broker and its workers don't need anything
//! that layering buys: every field here is fixed at process start.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/relaymq/config.toml` (system)
//! 2. `~/.config/relaymq/config.toml` (user)
//! 3. `./relaymq.toml` (local override)
//! 4. Environment variables (`RELAYMQ_*`)
//!
//! # Example Config
//!
//! ```toml
//! dispatcher_bind = "tcp://0.0.0.0:5671"
//! request_timeout_ms = 3000
//! inactivity_cutoff_ms = 10000
//! heartbeat_interval_ms = 3000
//! log_level = "info"
//! ```

pub mod loader;

pub use loader::ConfigSources;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete relaymq configuration, shared by the dispatcher and worker
/// binaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaymqConfig {
    /// ROUTER bind endpoint the dispatcher listens on and workers connect to.
    pub dispatcher_bind: String,
    /// Per-request deadline, in milliseconds (spec §4.D).
    pub request_timeout_ms: u64,
    /// Worker inactivity cutoff before fleet eviction, in milliseconds (spec §4.C).
    pub inactivity_cutoff_ms: u64,
    /// Idle threshold before a worker emits a heartbeat PING, in milliseconds (spec §4.B).
    pub heartbeat_interval_ms: u64,
    /// `tracing_subscriber` env-filter directive string.
    pub log_level: String,
}

impl Default for RelaymqConfig {
    fn default() -> Self {
        Self {
            dispatcher_bind: "tcp://0.0.0.0:5671".to_string(),
            request_timeout_ms: 3_000,
            inactivity_cutoff_ms: 10_000,
            heartbeat_interval_ms: 3_000,
            log_level: "info".to_string(),
        }
    }
}

impl RelaymqConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/relaymq/config.toml`
    /// 3. `~/.config/relaymq/config.toml`
    /// 4. `./relaymq.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./relaymq.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about which sources
    /// contributed values.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_sources_from(None)
    }

    /// Load configuration from optional path and return source information.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = RelaymqConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Request timeout as a [`std::time::Duration`].
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }

    /// Inactivity cutoff as a [`std::time::Duration`].
    pub fn inactivity_cutoff(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.inactivity_cutoff_ms)
    }

    /// Heartbeat interval as a [`std::time::Duration`].
    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.heartbeat_interval_ms)
    }
}
