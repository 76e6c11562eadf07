//! Built-in recovery strategies.
//!
//! Each strategy holds only the collaborator it drives. Predicates match on
//! the fault's source and on message patterns specific to the remedy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use faultline_domain::constants::{
    CONTEXT_EXTENSION_ID, CONTEXT_SURFACE_ID, STRATEGY_CONFIG_RESET, STRATEGY_DATABASE,
    STRATEGY_EXTENSION, STRATEGY_MEMORY, STRATEGY_SERVER_RESTART, STRATEGY_WINDOW,
};
use faultline_domain::{FaultRecord, FaultSource, FaultlineError, RecoveryConfig, Result};
use regex::Regex;
use tracing::{debug, info};

use super::ports::RecoveryStrategy;
use crate::collaborator_ports::{
    CacheManager, ConfigStore, ExtensionManager, ServiceManager, StoreManager, SurfaceManager,
};

const WINDOW_PATTERN: &str = r"(?i)window|renderer|render process|surface";
const DATABASE_PATTERN: &str = r"(?i)database|sqlite|disk i/o|malformed database";
const SERVER_PATTERN: &str = r"(?i)econnrefused|server|service (unavailable|crashed|exited)";
const MEMORY_PATTERN: &str = r"(?i)out of memory|heap|memory|allocation failed";
const CONFIG_SUBJECT_PATTERN: &str = r"(?i)\b(config|configuration|settings|preferences)\b";
const CONFIG_PROBLEM_PATTERN: &str = r"(?i)corrupt|invalid|parse|malformed";

/// Collaborators available to the built-in strategies. A strategy is only
/// built when its collaborator is present.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub surfaces: Option<Arc<dyn SurfaceManager>>,
    pub store: Option<Arc<dyn StoreManager>>,
    pub services: Option<Arc<dyn ServiceManager>>,
    pub extensions: Option<Arc<dyn ExtensionManager>>,
    pub cache: Option<Arc<dyn CacheManager>>,
    pub config: Option<Arc<dyn ConfigStore>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_surfaces(mut self, surfaces: Arc<dyn SurfaceManager>) -> Self {
        self.surfaces = Some(surfaces);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn StoreManager>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_services(mut self, services: Arc<dyn ServiceManager>) -> Self {
        self.services = Some(services);
        self
    }

    pub fn with_extensions(mut self, extensions: Arc<dyn ExtensionManager>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_config(mut self, config: Arc<dyn ConfigStore>) -> Self {
        self.config = Some(config);
        self
    }
}

/// Build the built-in strategies for whichever collaborators are present
pub fn builtin_strategies(
    collaborators: &Collaborators,
    config: &RecoveryConfig,
) -> Result<Vec<Arc<dyn RecoveryStrategy>>> {
    let mut strategies: Vec<Arc<dyn RecoveryStrategy>> = Vec::new();

    if let Some(surfaces) = &collaborators.surfaces {
        strategies.push(Arc::new(WindowRecovery {
            surfaces: Arc::clone(surfaces),
            pattern: compile(WINDOW_PATTERN)?,
        }));
    }
    if let Some(store) = &collaborators.store {
        strategies.push(Arc::new(DatabaseRecovery {
            store: Arc::clone(store),
            pattern: compile(DATABASE_PATTERN)?,
        }));
    }
    if let Some(services) = &collaborators.services {
        strategies.push(Arc::new(ServerRestart {
            services: Arc::clone(services),
            restart_delay: config.service_restart_delay(),
            pattern: compile(SERVER_PATTERN)?,
        }));
    }
    if let Some(extensions) = &collaborators.extensions {
        strategies.push(Arc::new(ExtensionRecovery { extensions: Arc::clone(extensions) }));
    }
    if let Some(cache) = &collaborators.cache {
        strategies.push(Arc::new(MemoryRecovery {
            cache: Arc::clone(cache),
            pattern: compile(MEMORY_PATTERN)?,
        }));
    }
    if let Some(store) = &collaborators.config {
        strategies.push(Arc::new(ConfigReset {
            config: Arc::clone(store),
            subject: compile(CONFIG_SUBJECT_PATTERN)?,
            problem: compile(CONFIG_PROBLEM_PATTERN)?,
        }));
    }

    debug!(count = strategies.len(), "Built-in recovery strategies assembled");
    Ok(strategies)
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|err| FaultlineError::Internal(format!("invalid pattern '{pattern}': {err}")))
}

/// Reload a terminated presentation surface, or recreate it once destroyed
pub struct WindowRecovery {
    surfaces: Arc<dyn SurfaceManager>,
    pattern: Regex,
}

#[async_trait]
impl RecoveryStrategy for WindowRecovery {
    fn name(&self) -> &str {
        STRATEGY_WINDOW
    }

    fn priority(&self) -> i32 {
        100
    }

    fn can_recover(&self, fault: &FaultRecord) -> bool {
        fault.source == FaultSource::UiSurface || self.pattern.is_match(fault.message())
    }

    async fn recover(&self, fault: &FaultRecord) -> anyhow::Result<bool> {
        if let Some(id) = fault.context_str(CONTEXT_SURFACE_ID) {
            if !self.surfaces.is_destroyed(id).await {
                info!(surface_id = id, "Reloading surface");
                self.surfaces.reload(id).await?;
                return Ok(true);
            }
        }
        info!("Recreating surface");
        self.surfaces.recreate().await?;
        Ok(true)
    }
}

/// Repair then reinitialise the durable store
pub struct DatabaseRecovery {
    store: Arc<dyn StoreManager>,
    pattern: Regex,
}

#[async_trait]
impl RecoveryStrategy for DatabaseRecovery {
    fn name(&self) -> &str {
        STRATEGY_DATABASE
    }

    fn priority(&self) -> i32 {
        90
    }

    fn can_recover(&self, fault: &FaultRecord) -> bool {
        self.pattern.is_match(fault.message())
    }

    async fn recover(&self, _fault: &FaultRecord) -> anyhow::Result<bool> {
        self.store.repair().await?;
        self.store.initialize().await?;
        info!("Durable store reinitialised");
        Ok(true)
    }
}

/// Stop and start a dependent background service
pub struct ServerRestart {
    services: Arc<dyn ServiceManager>,
    restart_delay: Duration,
    pattern: Regex,
}

#[async_trait]
impl RecoveryStrategy for ServerRestart {
    fn name(&self) -> &str {
        STRATEGY_SERVER_RESTART
    }

    fn priority(&self) -> i32 {
        80
    }

    fn can_recover(&self, fault: &FaultRecord) -> bool {
        fault.source == FaultSource::DependentService || self.pattern.is_match(fault.message())
    }

    async fn recover(&self, _fault: &FaultRecord) -> anyhow::Result<bool> {
        self.services.stop().await?;
        tokio::time::sleep(self.restart_delay).await;
        self.services.start().await?;
        info!("Dependent service restarted");
        Ok(true)
    }
}

/// Disable the extension named in the fault's context
pub struct ExtensionRecovery {
    extensions: Arc<dyn ExtensionManager>,
}

#[async_trait]
impl RecoveryStrategy for ExtensionRecovery {
    fn name(&self) -> &str {
        STRATEGY_EXTENSION
    }

    fn priority(&self) -> i32 {
        70
    }

    fn can_recover(&self, fault: &FaultRecord) -> bool {
        fault.source == FaultSource::Extension && fault.context_str(CONTEXT_EXTENSION_ID).is_some()
    }

    async fn recover(&self, fault: &FaultRecord) -> anyhow::Result<bool> {
        let Some(extension_id) = fault.context_str(CONTEXT_EXTENSION_ID) else {
            return Ok(false);
        };
        self.extensions.disable(extension_id).await?;
        info!(extension_id, "Disabled faulty extension");
        Ok(true)
    }
}

/// Drop caches and ask for memory to be released
pub struct MemoryRecovery {
    cache: Arc<dyn CacheManager>,
    pattern: Regex,
}

#[async_trait]
impl RecoveryStrategy for MemoryRecovery {
    fn name(&self) -> &str {
        STRATEGY_MEMORY
    }

    fn priority(&self) -> i32 {
        60
    }

    fn can_recover(&self, fault: &FaultRecord) -> bool {
        self.pattern.is_match(fault.message())
    }

    async fn recover(&self, _fault: &FaultRecord) -> anyhow::Result<bool> {
        self.cache.invalidate_all().await?;
        self.cache.request_gc();
        Ok(true)
    }
}

/// Reset configuration to defaults when it looks corrupted
pub struct ConfigReset {
    config: Arc<dyn ConfigStore>,
    subject: Regex,
    problem: Regex,
}

#[async_trait]
impl RecoveryStrategy for ConfigReset {
    fn name(&self) -> &str {
        STRATEGY_CONFIG_RESET
    }

    fn priority(&self) -> i32 {
        50
    }

    fn can_recover(&self, fault: &FaultRecord) -> bool {
        let message = fault.message();
        self.subject.is_match(message) && self.problem.is_match(message)
    }

    async fn recover(&self, _fault: &FaultRecord) -> anyhow::Result<bool> {
        let previous = self.config.snapshot().await?;
        debug!(%previous, "Configuration before reset");
        self.config.reset_to_defaults().await?;
        info!("Configuration reset to defaults");
        Ok(true)
    }
}
