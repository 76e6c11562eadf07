//! Configuration store over the loaded [`Config`]

use async_trait::async_trait;
use faultline_core::ConfigStore;
use faultline_domain::{Config, Result};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;

/// Holds the running configuration.
///
/// A reset keeps the storage location so persisted faults stay reachable
/// after the restart that follows it.
#[derive(Debug)]
pub struct AppConfigStore {
    current: RwLock<Config>,
}

impl AppConfigStore {
    pub fn new(config: Config) -> Self {
        Self { current: RwLock::new(config) }
    }

    pub fn current(&self) -> Config {
        self.current.read().clone()
    }
}

#[async_trait]
impl ConfigStore for AppConfigStore {
    async fn snapshot(&self) -> Result<Value> {
        Ok(serde_json::to_value(&*self.current.read())?)
    }

    async fn reset_to_defaults(&self) -> Result<()> {
        let mut current = self.current.write();
        let storage = current.storage.clone();
        *current = Config { storage, ..Config::default() };
        warn!("Configuration reset to defaults");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    /// Validates a reset restores defaults but keeps the data directory.
    ///
    /// Assertions:
    /// - Tuned recovery settings are back to their defaults
    /// - `storage.data_dir` is unchanged
    #[tokio::test]
    async fn test_reset_keeps_storage_location() {
        let mut config = Config::default();
        config.recovery.max_attempts = 1;
        config.storage.data_dir = PathBuf::from("/srv/faultline");
        let store = AppConfigStore::new(config);

        let before = store.snapshot().await.expect("snapshot");
        assert_eq!(before["recovery"]["max_attempts"], 1);

        store.reset_to_defaults().await.expect("reset");
        let after = store.current();
        assert_eq!(after.recovery, Config::default().recovery);
        assert_eq!(after.storage.data_dir, PathBuf::from("/srv/faultline"));
    }
}
