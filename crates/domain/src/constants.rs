//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Recorder
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
pub const DEFAULT_RESTORE_WINDOW_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const REPORT_TOP_MESSAGES: usize = 5;

// Recovery loop breaker
pub const DEFAULT_MAX_RECOVERY_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECOVERY_WINDOW_SECS: u64 = 5 * 60;
pub const DEFAULT_STRATEGY_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_STRATEGY_ATTEMPTS: u32 = 1;
pub const DEFAULT_SERVICE_RESTART_DELAY_MS: u64 = 1_000;

// Executor defaults
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_OPERATION_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

// Shutdown
pub const DEFAULT_SHUTDOWN_DEADLINE_MS: u64 = 10_000;

// Storage layout
pub const DEFAULT_DATA_DIR: &str = "./faultline-data";
pub const FAULTS_DIR: &str = "faults";
pub const RECOVERY_STATE_FILE: &str = "recovery-state.json";
pub const DAY_LOG_PREFIX: &str = "faults-";
pub const DAY_LOG_EXTENSION: &str = "log";

// Built-in strategy names
pub const STRATEGY_WINDOW: &str = "window-recovery";
pub const STRATEGY_DATABASE: &str = "database-recovery";
pub const STRATEGY_SERVER_RESTART: &str = "server-restart";
pub const STRATEGY_EXTENSION: &str = "extension-recovery";
pub const STRATEGY_MEMORY: &str = "memory-recovery";
pub const STRATEGY_CONFIG_RESET: &str = "config-reset";

// Fault context keys
pub const CONTEXT_SURFACE_ID: &str = "surface_id";
pub const CONTEXT_EXTENSION_ID: &str = "extension_id";
pub const CONTEXT_OPERATION: &str = "operation";
pub const CONTEXT_ATTEMPT: &str = "attempt";
pub const CONTEXT_REASON: &str = "reason";
pub const CONTEXT_TASK: &str = "task";
