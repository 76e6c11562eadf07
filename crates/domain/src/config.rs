//! Configuration structures
//!
//! Every section has defaults, so an empty file (or no file) is a valid
//! configuration. Durations are stored as integer seconds or milliseconds
//! and exposed as [`Duration`] through accessors.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_RECOVERY_ATTEMPTS,
    DEFAULT_OPERATION_RETRIES, DEFAULT_OPERATION_TIMEOUT_MS, DEFAULT_RECOVERY_WINDOW_SECS,
    DEFAULT_RESTORE_WINDOW_SECS, DEFAULT_RETENTION_DAYS, DEFAULT_RETRY_DELAY_MS,
    DEFAULT_SERVICE_RESTART_DELAY_MS, DEFAULT_SHUTDOWN_DEADLINE_MS, DEFAULT_STRATEGY_ATTEMPTS,
    DEFAULT_STRATEGY_TIMEOUT_MS, FAULTS_DIR, RECOVERY_STATE_FILE,
};
use crate::errors::{FaultlineError, Result};
use crate::impl_domain_status_conversions;

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recorder: RecorderConfig,
    pub recovery: RecoveryConfig,
    pub executor: ExecutorConfig,
    pub shutdown: ShutdownConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values that would disable a component outright
    pub fn validate(&self) -> Result<()> {
        fn non_zero(value: u64, field: &str) -> Result<()> {
            if value == 0 {
                return Err(FaultlineError::Config(format!("{field} must be greater than 0")));
            }
            Ok(())
        }

        non_zero(self.recorder.history_capacity as u64, "recorder.history_capacity")?;
        non_zero(self.recorder.restore_window_secs, "recorder.restore_window_secs")?;
        non_zero(u64::from(self.recorder.retention_days), "recorder.retention_days")?;
        non_zero(u64::from(self.recovery.max_attempts), "recovery.max_attempts")?;
        non_zero(self.recovery.window_secs, "recovery.window_secs")?;
        non_zero(self.recovery.strategy_timeout_ms, "recovery.strategy_timeout_ms")?;
        non_zero(u64::from(self.recovery.strategy_attempts), "recovery.strategy_attempts")?;
        non_zero(self.executor.default_timeout_ms, "executor.default_timeout_ms")?;
        non_zero(u64::from(self.executor.default_retries), "executor.default_retries")?;
        non_zero(self.shutdown.deadline_ms, "shutdown.deadline_ms")?;
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(FaultlineError::Config("storage.data_dir must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// In-memory history capacity; oldest records are evicted first
    pub history_capacity: usize,
    /// Persisted records newer than this are reloaded at startup
    pub restore_window_secs: u64,
    /// Persisted records older than this are purged by the retention sweeper
    pub retention_days: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            restore_window_secs: DEFAULT_RESTORE_WINDOW_SECS,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl RecorderConfig {
    pub fn restore_window(&self) -> Duration {
        Duration::from_secs(self.restore_window_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_days) * 24 * 60 * 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Attempts allowed inside one window before the loop breaker engages
    pub max_attempts: u32,
    pub window_secs: u64,
    /// Timeout applied to each strategy's `recover`
    pub strategy_timeout_ms: u64,
    /// Total attempts per strategy within one recovery pass
    pub strategy_attempts: u32,
    /// Pause between stopping and starting a dependent service
    pub service_restart_delay_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECOVERY_ATTEMPTS,
            window_secs: DEFAULT_RECOVERY_WINDOW_SECS,
            strategy_timeout_ms: DEFAULT_STRATEGY_TIMEOUT_MS,
            strategy_attempts: DEFAULT_STRATEGY_ATTEMPTS,
            service_restart_delay_ms: DEFAULT_SERVICE_RESTART_DELAY_MS,
        }
    }
}

impl RecoveryConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_millis(self.strategy_timeout_ms)
    }

    pub fn service_restart_delay(&self) -> Duration {
        Duration::from_millis(self.service_restart_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub default_timeout_ms: u64,
    /// Total attempts, including the first
    pub default_retries: u32,
    pub default_retry_delay_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            default_retries: DEFAULT_OPERATION_RETRIES,
            default_retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl ExecutorConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn default_retry_delay(&self) -> Duration {
        Duration::from_millis(self.default_retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Hard deadline for draining the resource registry
    pub deadline_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { deadline_ms: DEFAULT_SHUTDOWN_DEADLINE_MS }
    }
}

impl ShutdownConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from(DEFAULT_DATA_DIR) }
    }
}

impl StorageConfig {
    /// Directory holding one JSON file per fault plus the day logs
    pub fn faults_dir(&self) -> PathBuf {
        self.data_dir.join(FAULTS_DIR)
    }

    pub fn recovery_state_path(&self) -> PathBuf {
        self.data_dir.join(RECOVERY_STATE_FILE)
    }
}

/// Console output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl_domain_status_conversions!(LogFormat {
    Pretty => "pretty",
    Json => "json",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG`/`FAULTLINE_LOG` are unset
    pub filter: String,
    pub format: LogFormat,
    /// Daily rolling log files are written here when set
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_string(), format: LogFormat::Pretty, log_dir: None }
    }
}
