//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, RelaymqConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order).
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values.
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local). Only returns files
/// that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/relaymq/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("relaymq/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("relaymq.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file. Missing fields keep the running default.
pub fn load_from_file(path: &Path) -> Result<RelaymqConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge two configs, with `overlay` taking precedence field-by-field over
/// non-default values in `base`.
pub fn merge_configs(base: RelaymqConfig, overlay: RelaymqConfig) -> RelaymqConfig {
    let default = RelaymqConfig::default();
    RelaymqConfig {
        dispatcher_bind: if overlay.dispatcher_bind != default.dispatcher_bind {
            overlay.dispatcher_bind
        } else {
            base.dispatcher_bind
        },
        request_timeout_ms: if overlay.request_timeout_ms != default.request_timeout_ms {
            overlay.request_timeout_ms
        } else {
            base.request_timeout_ms
        },
        inactivity_cutoff_ms: if overlay.inactivity_cutoff_ms != default.inactivity_cutoff_ms {
            overlay.inactivity_cutoff_ms
        } else {
            base.inactivity_cutoff_ms
        },
        heartbeat_interval_ms: if overlay.heartbeat_interval_ms != default.heartbeat_interval_ms {
            overlay.heartbeat_interval_ms
        } else {
            base.heartbeat_interval_ms
        },
        log_level: if overlay.log_level != default.log_level {
            overlay.log_level
        } else {
            base.log_level
        },
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut RelaymqConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("RELAYMQ_DISPATCHER_BIND") {
        config.dispatcher_bind = v;
        sources.env_overrides.push("RELAYMQ_DISPATCHER_BIND".to_string());
    }
    if let Ok(v) = env::var("RELAYMQ_REQUEST_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.request_timeout_ms = ms;
            sources.env_overrides.push("RELAYMQ_REQUEST_TIMEOUT_MS".to_string());
        }
    }
    if let Ok(v) = env::var("RELAYMQ_INACTIVITY_CUTOFF_MS") {
        if let Ok(ms) = v.parse() {
            config.inactivity_cutoff_ms = ms;
            sources.env_overrides.push("RELAYMQ_INACTIVITY_CUTOFF_MS".to_string());
        }
    }
    if let Ok(v) = env::var("RELAYMQ_HEARTBEAT_INTERVAL_MS") {
        if let Ok(ms) = v.parse() {
            config.heartbeat_interval_ms = ms;
            sources.env_overrides.push("RELAYMQ_HEARTBEAT_INTERVAL_MS".to_string());
        }
    }
    if let Ok(v) = env::var("RELAYMQ_LOG_LEVEL") {
        config.log_level = v;
        sources.env_overrides.push("RELAYMQ_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG, since tracing_subscriber::EnvFilter reads it by
    // convention and operators will reach for it out of habit.
    if let Ok(v) = env::var("RUST_LOG") {
        config.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}
