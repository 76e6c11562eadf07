//! Configuration loader
//!
//! Loads application configuration from a file, then applies environment
//! overrides on top of it.
//!
//! ## Loading Strategy
//! 1. Probe the standard locations for a config file
//! 2. Fall back to defaults when no file exists
//! 3. Apply `FAULTLINE_*` environment overrides field by field
//! 4. Validate the result
//!
//! ## Environment Variables
//! - `FAULTLINE_DATA_DIR`: Storage root directory
//! - `FAULTLINE_HISTORY_CAPACITY`: In-memory fault history capacity
//! - `FAULTLINE_MAX_RECOVERY_ATTEMPTS`: Loop breaker threshold
//! - `FAULTLINE_RECOVERY_WINDOW_SECS`: Loop breaker window in seconds
//! - `FAULTLINE_SHUTDOWN_DEADLINE_MS`: Registry drain deadline
//! - `FAULTLINE_LOG_FILTER`: Default `EnvFilter` directive
//! - `FAULTLINE_LOG_FORMAT`: `pretty` or `json`
//! - `FAULTLINE_LOG_DIR`: Directory for daily log files (empty disables)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./faultline.toml`, `./faultline.json` (current working directory)
//! 2. `./config.toml`, `./config.json` (current working directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use faultline_domain::{Config, FaultlineError, LogFormat, Result};

use crate::errors::InfraError;

pub const ENV_DATA_DIR: &str = "FAULTLINE_DATA_DIR";
pub const ENV_HISTORY_CAPACITY: &str = "FAULTLINE_HISTORY_CAPACITY";
pub const ENV_MAX_RECOVERY_ATTEMPTS: &str = "FAULTLINE_MAX_RECOVERY_ATTEMPTS";
pub const ENV_RECOVERY_WINDOW_SECS: &str = "FAULTLINE_RECOVERY_WINDOW_SECS";
pub const ENV_SHUTDOWN_DEADLINE_MS: &str = "FAULTLINE_SHUTDOWN_DEADLINE_MS";
pub const ENV_LOG_FILTER: &str = "FAULTLINE_LOG_FILTER";
pub const ENV_LOG_FORMAT: &str = "FAULTLINE_LOG_FORMAT";
pub const ENV_LOG_DIR: &str = "FAULTLINE_LOG_DIR";

const CONFIG_FILE_NAMES: [&str; 4] =
    ["faultline.toml", "faultline.json", "config.toml", "config.json"];

/// Load configuration from the first config file found (or defaults), with
/// environment overrides applied and the result validated.
///
/// # Errors
/// Returns `FaultlineError::Config` if:
/// - A config file exists but cannot be read or parsed
/// - An override variable holds an invalid value
/// - The merged configuration fails validation
pub fn load() -> Result<Config> {
    let mut config = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::info!("No config file found, using defaults");
            Config::default()
        }
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
/// Sections and fields missing from the file keep their defaults.
///
/// # Errors
/// Returns `FaultlineError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(FaultlineError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            FaultlineError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| FaultlineError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents)
            .map_err(|e| FaultlineError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(FaultlineError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Override individual fields from `FAULTLINE_*` environment variables
///
/// Unset variables leave the field untouched.
///
/// # Errors
/// Returns `FaultlineError::Config` naming the variable when a value cannot
/// be parsed.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(dir) = env_string(ENV_DATA_DIR) {
        config.storage.data_dir = PathBuf::from(dir);
    }
    if let Some(capacity) = env_parse(ENV_HISTORY_CAPACITY)? {
        config.recorder.history_capacity = capacity;
    }
    if let Some(attempts) = env_parse(ENV_MAX_RECOVERY_ATTEMPTS)? {
        config.recovery.max_attempts = attempts;
    }
    if let Some(window) = env_parse(ENV_RECOVERY_WINDOW_SECS)? {
        config.recovery.window_secs = window;
    }
    if let Some(deadline) = env_parse(ENV_SHUTDOWN_DEADLINE_MS)? {
        config.shutdown.deadline_ms = deadline;
    }
    if let Some(filter) = env_string(ENV_LOG_FILTER) {
        config.logging.filter = filter;
    }
    if let Some(format) = env_string(ENV_LOG_FORMAT) {
        config.logging.format = LogFormat::from_str(&format)
            .map_err(|e| FaultlineError::Config(format!("{ENV_LOG_FORMAT}: {e}")))?;
    }
    if let Ok(dir) = std::env::var(ENV_LOG_DIR) {
        config.logging.log_dir = (!dir.trim().is_empty()).then(|| PathBuf::from(dir));
    }
    Ok(())
}

/// Non-empty environment variable value
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse an environment variable when it is set
///
/// # Errors
/// Returns `FaultlineError::Config` if the value does not parse as `T`.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| FaultlineError::Config(format!("Invalid {key} '{raw}': {e}")))
        })
        .transpose()
}
