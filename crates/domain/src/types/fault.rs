//! Fault records and their classification axes.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::impl_domain_status_conversions;

/// Free-form structured metadata attached to a fault
pub type FaultContext = Map<String, Value>;

/// Escalation weight of a fault.
///
/// Severity never decides whether recovery is attempted; it only decides how
/// loudly a fault is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl_domain_status_conversions!(FaultSeverity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

impl FaultSeverity {
    /// All severities, least severe first
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Upper-case label used in day-log lines
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn is_critical(self) -> bool {
        self == Self::Critical
    }
}

impl Default for FaultSeverity {
    fn default() -> Self {
        Self::Medium
    }
}

/// Where a fault originated. Decides which recovery strategies are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultSource {
    CoreProcess,
    UiSurface,
    Extension,
    DependentService,
    Unknown,
}

impl_domain_status_conversions!(FaultSource {
    CoreProcess => "core-process",
    UiSurface => "ui-surface",
    Extension => "extension",
    DependentService => "dependent-service",
    Unknown => "unknown",
});

impl FaultSource {
    /// All sources in declaration order
    pub const ALL: [Self; 5] =
        [Self::CoreProcess, Self::UiSurface, Self::Extension, Self::DependentService, Self::Unknown];

    /// Upper-case label used in day-log lines
    pub fn label(self) -> &'static str {
        match self {
            Self::CoreProcess => "CORE-PROCESS",
            Self::UiSurface => "UI-SURFACE",
            Self::Extension => "EXTENSION",
            Self::DependentService => "DEPENDENT-SERVICE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl Default for FaultSource {
    fn default() -> Self {
        Self::Unknown
    }
}

/// The underlying failure of a fault: message plus optional type and trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl FaultError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: None, stack: None }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Capture an error and its `source()` chain. The chain below the top
    /// error becomes the trace, one cause per line.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut current = err.source();
        while let Some(cause) = current {
            causes.push(format!("caused by: {cause}"));
            current = cause.source();
        }
        let fault = Self::new(err.to_string());
        if causes.is_empty() {
            fault
        } else {
            fault.with_stack(causes.join("\n"))
        }
    }
}

impl fmt::Display for FaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{kind}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl From<&str> for FaultError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for FaultError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Point-in-time resource usage captured with each fault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub pid: u32,
    /// Resident memory in bytes
    pub memory_bytes: u64,
    /// Virtual memory in bytes
    pub virtual_memory_bytes: u64,
    /// Seconds since the process started
    pub uptime_secs: u64,
}

/// One observed error. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: FaultError,
    pub severity: FaultSeverity,
    pub source: FaultSource,
    /// Caller already attempted local recovery before reporting
    pub handled: bool,
    pub session_id: Uuid,
    #[serde(default)]
    pub context: FaultContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_snapshot: Option<SystemSnapshot>,
}

impl FaultRecord {
    pub fn message(&self) -> &str {
        &self.error.message
    }

    /// String value stored under `key` in the context
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }

    /// `[ISO-timestamp] SEVERITY - SOURCE - message`
    pub fn day_log_line(&self) -> String {
        format!(
            "[{}] {} - {} - {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.severity.label(),
            self.source.label(),
            self.error.message.replace('\n', " ")
        )
    }
}
