//! Configuration file loading with precedence handling.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::view_state::log::TimeDisplay;
use crate::view_state::matcher::MatchMode;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TXVIEW_CONFIG";

/// Environment variable forcing relative timestamps (`1`/`true` or `0`/`false`).
pub const RELATIVE_TIME_ENV: &str = "TXVIEW_RELATIVE_TIME";

/// Errors that can occur during config loading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Failed to read config file (permission issues, not a file).
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError {
        /// Path that failed to read.
        path: PathBuf,
        /// Reason for failure.
        reason: String,
    },

    /// Config file contains invalid TOML or an unknown key.
    #[error("Invalid TOML in {path}: {reason}")]
    ParseError {
        /// Path with invalid TOML.
        path: PathBuf,
        /// Parse error details.
        reason: String,
    },
}

/// TOML configuration file structure.
///
/// All fields are optional; anything left out keeps its default.
/// Corresponds to `~/.config/txview/config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Re-read the file when its modification time changes.
    #[serde(default)]
    pub auto_refresh: Option<bool>,

    /// Seconds between modification-time checks.
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,

    /// Carry hidden threads, loggers and levels over to a reloaded file.
    #[serde(default)]
    pub keep_filter_on_refresh: Option<bool>,

    /// Show timestamps relative to the zero-time record.
    #[serde(default)]
    pub relative_time: Option<bool>,

    /// How search and filter text is matched.
    #[serde(default)]
    pub search_mode: Option<MatchMode>,

    /// Path to log file for tracing output.
    #[serde(default)]
    pub log_file_path: Option<PathBuf>,
}

/// Resolved configuration after applying precedence rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub auto_refresh: bool,
    pub refresh_interval_secs: u64,
    pub keep_filter_on_refresh: bool,
    pub relative_time: bool,
    pub search_mode: MatchMode,
    pub log_file_path: PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            auto_refresh: false,
            refresh_interval_secs: 2,
            keep_filter_on_refresh: true,
            relative_time: false,
            search_mode: MatchMode::Substring,
            log_file_path: default_log_path(),
        }
    }
}

impl ResolvedConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn time_display(&self) -> TimeDisplay {
        if self.relative_time {
            TimeDisplay::Relative
        } else {
            TimeDisplay::Absolute
        }
    }
}

/// Resolve default log file path.
///
/// Returns `~/.local/state/txview/txview.log` on Linux, or the platform's
/// state directory elsewhere. Falls back to the current directory.
pub fn default_log_path() -> PathBuf {
    match dirs::state_dir() {
        Some(state_dir) => state_dir.join("txview").join("txview.log"),
        None => PathBuf::from("txview.log"),
    }
}

/// Load configuration file from a specific path.
///
/// Returns `Ok(None)` if the file doesn't exist (use defaults).
///
/// # Errors
///
/// Returns error if the file exists but cannot be read or parsed.
pub fn load_config_file(path: impl Into<PathBuf>) -> Result<Option<ConfigFile>, ConfigError> {
    let path = path.into();

    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let config: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    Ok(Some(config))
}

/// Resolve default config file path, `~/.config/txview/config.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("txview").join("config.toml"))
}

/// Load configuration with precedence handling.
///
/// Precedence (highest to lowest):
/// 1. Explicit `config_path` argument (CLI `--config`)
/// 2. `TXVIEW_CONFIG` environment variable
/// 3. Default path
///
/// # Errors
///
/// Returns error only if a config file exists but cannot be read or parsed.
pub fn load_config_with_precedence(
    config_path: Option<PathBuf>,
) -> Result<Option<ConfigFile>, ConfigError> {
    if let Some(path) = config_path {
        return load_config_file(path);
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return load_config_file(PathBuf::from(env_path));
    }

    match default_config_path() {
        Some(default_path) => load_config_file(default_path),
        None => Ok(None),
    }
}

/// Apply environment variable overrides to resolved config.
///
/// Unrecognized values of `TXVIEW_RELATIVE_TIME` are ignored.
pub fn apply_env_overrides(mut config: ResolvedConfig) -> ResolvedConfig {
    if let Ok(value) = std::env::var(RELATIVE_TIME_ENV) {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => config.relative_time = true,
            "0" | "false" | "no" => config.relative_time = false,
            _ => {}
        }
    }
    config
}

/// Merge config file into defaults to create resolved config.
pub fn merge_config(config_file: Option<ConfigFile>) -> ResolvedConfig {
    let defaults = ResolvedConfig::default();

    let Some(config) = config_file else {
        return defaults;
    };

    ResolvedConfig {
        auto_refresh: config.auto_refresh.unwrap_or(defaults.auto_refresh),
        refresh_interval_secs: config
            .refresh_interval_secs
            .unwrap_or(defaults.refresh_interval_secs),
        keep_filter_on_refresh: config
            .keep_filter_on_refresh
            .unwrap_or(defaults.keep_filter_on_refresh),
        relative_time: config.relative_time.unwrap_or(defaults.relative_time),
        search_mode: config.search_mode.unwrap_or(defaults.search_mode),
        log_file_path: config.log_file_path.unwrap_or(defaults.log_file_path),
    }
}

/// Apply CLI argument overrides to resolved config.
///
/// Only flags the user actually passed are applied.
pub fn apply_cli_overrides(
    mut config: ResolvedConfig,
    relative_time_override: Option<bool>,
) -> ResolvedConfig {
    if let Some(relative_time) = relative_time_override {
        config.relative_time = relative_time;
    }
    config
}

/// Defaults, then file, then environment, then CLI.
///
/// # Errors
///
/// Returns error if a config file exists but cannot be read or parsed.
pub fn resolve(
    config_path: Option<PathBuf>,
    relative_time_override: Option<bool>,
) -> Result<ResolvedConfig, ConfigError> {
    let file = load_config_with_precedence(config_path)?;
    let config = apply_env_overrides(merge_config(file));
    Ok(apply_cli_overrides(config, relative_time_override))
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
