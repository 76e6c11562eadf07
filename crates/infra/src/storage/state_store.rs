//! Recovery state persisted as a single JSON document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use faultline_core::RecoveryStateStore;
use faultline_domain::{RecoveryState, Result, StorageConfig};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::InfraError;

/// [`RecoveryStateStore`] overwriting one file per save.
///
/// Saves go to a uniquely named sibling temp file first and are renamed
/// into place, so a crash mid-write leaves the previous snapshot intact.
/// Saves through one store (and its clones) are serialized.
#[derive(Debug, Clone)]
pub struct FileRecoveryStateStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileRecoveryStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Arc::new(Mutex::new(())) }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(storage.recovery_state_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl RecoveryStateStore for FileRecoveryStateStore {
    async fn load(&self) -> Result<Option<RecoveryState>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(InfraError::io_at(&self.path, e).into()),
        };
        let state = serde_json::from_slice(&bytes).map_err(InfraError::from)?;
        Ok(Some(state))
    }

    async fn save(&self, state: &RecoveryState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| InfraError::io_at(parent, e))?;
        }

        let json = serde_json::to_vec_pretty(state).map_err(InfraError::from)?;
        let _write = self.write_lock.lock().await;
        let temp = self.temp_path();
        fs::write(&temp, json).await.map_err(|e| InfraError::io_at(&temp, e))?;
        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(InfraError::io_at(&self.path, e).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_is_unique_sibling() {
        let store = FileRecoveryStateStore::new("/data/recovery-state.json");
        let first = store.temp_path();
        let second = store.temp_path();

        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(Path::new("/data")));
        let name = first.file_name().and_then(|n| n.to_str()).expect("utf-8 name");
        assert!(name.starts_with("recovery-state.json."));
        assert!(name.ends_with(".tmp"));
    }
}
