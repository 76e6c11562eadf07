//! Port interfaces for external collaborators
//!
//! The resilience core calls into the rest of the application only through
//! these traits. Each built-in recovery strategy receives just the
//! collaborator it needs when it is constructed.

use async_trait::async_trait;
use faultline_domain::{EscalationChoice, FaultRecord, Result};
use serde_json::Value;

/// Presentation-surface manager (windows, views)
#[async_trait]
pub trait SurfaceManager: Send + Sync {
    /// Create a fresh main surface
    async fn recreate(&self) -> Result<()>;

    /// Reload an existing surface in place
    async fn reload(&self, surface_id: &str) -> Result<()>;

    async fn is_destroyed(&self, surface_id: &str) -> bool;
}

/// Durable-store manager
#[async_trait]
pub trait StoreManager: Send + Sync {
    /// Out-of-band repair hook, invoked before reinitialization
    async fn repair(&self) -> Result<()>;

    async fn initialize(&self) -> Result<()>;
}

/// Dependent background service manager
#[async_trait]
pub trait ServiceManager: Send + Sync {
    async fn stop(&self) -> Result<()>;

    async fn start(&self) -> Result<()>;
}

/// Extension manager
#[async_trait]
pub trait ExtensionManager: Send + Sync {
    async fn disable(&self, extension_id: &str) -> Result<()>;
}

/// Cache and memory collaborator
#[async_trait]
pub trait CacheManager: Send + Sync {
    async fn invalidate_all(&self) -> Result<()>;

    /// Best-effort request to release memory
    fn request_gc(&self);
}

/// Configuration store
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Current configuration, for diagnostics before a reset
    async fn snapshot(&self) -> Result<Value>;

    async fn reset_to_defaults(&self) -> Result<()>;
}

/// Interactive escalation surface
#[async_trait]
pub trait EscalationSurface: Send + Sync {
    /// Announce a critical fault before recovery is attempted
    async fn notify(&self, fault: &FaultRecord) -> Result<()>;

    /// Ask for a decision once automated recovery is exhausted
    async fn prompt_choice(
        &self,
        fault: &FaultRecord,
        options: &[EscalationChoice],
    ) -> Result<EscalationChoice>;
}

/// Process-level actions requested by escalation decisions
#[async_trait]
pub trait ProcessControl: Send + Sync {
    async fn restart(&self) -> Result<()>;

    async fn quit(&self) -> Result<()>;
}

/// External aggregation sink. Best-effort; its absence changes nothing.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send(&self, record: FaultRecord) -> Result<()>;
}
