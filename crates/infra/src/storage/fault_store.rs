//! Fault store backed by a directory of JSON files.
//!
//! Layout under the faults directory:
//! - `<id>.json`: one pretty-printed [`FaultRecord`] per fault
//! - `faults-YYYY-MM-DD.log`: append-only day log, one line per fault

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use faultline_core::FaultStore;
use faultline_domain::constants::{DAY_LOG_EXTENSION, DAY_LOG_PREFIX};
use faultline_domain::{FaultRecord, Result, StorageConfig};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::InfraError;

const RECORD_EXTENSION: &str = "json";
const DAY_LOG_DATE_FORMAT: &str = "%Y-%m-%d";

/// What a file in the faults directory holds
enum StoredFile {
    Record,
    DayLog(NaiveDate),
    Other,
}

/// [`FaultStore`] writing under a single directory
#[derive(Debug, Clone)]
pub struct FileFaultStore {
    dir: PathBuf,
}

impl FileFaultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `<data_dir>/faults`
    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(storage.faults_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    pub fn day_log_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{DAY_LOG_PREFIX}{}.{DAY_LOG_EXTENSION}",
            date.format(DAY_LOG_DATE_FORMAT)
        ))
    }

    async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await.map_err(|e| InfraError::io_at(&self.dir, e))?;
        Ok(())
    }

    /// Directory entries, or none when the directory does not exist yet
    async fn entries(&self) -> Result<Vec<PathBuf>> {
        let mut reader = match fs::read_dir(&self.dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(InfraError::io_at(&self.dir, e).into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) =
            reader.next_entry().await.map_err(|e| InfraError::io_at(&self.dir, e))?
        {
            paths.push(entry.path());
        }
        Ok(paths)
    }

    async fn read_record(path: &Path) -> Result<FaultRecord> {
        let bytes = fs::read(path).await.map_err(|e| InfraError::io_at(path, e))?;
        Ok(serde_json::from_slice(&bytes).map_err(InfraError::from)?)
    }

    /// Capture time of a record file; falls back to the file's mtime when the
    /// contents cannot be parsed.
    async fn record_timestamp(path: &Path) -> Option<DateTime<Utc>> {
        match Self::read_record(path).await {
            Ok(record) => Some(record.timestamp),
            Err(_) => {
                let modified = fs::metadata(path).await.ok()?.modified().ok()?;
                Some(DateTime::<Utc>::from(modified))
            }
        }
    }

    fn classify(path: &Path) -> StoredFile {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return StoredFile::Other;
        };
        if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION) {
            return StoredFile::Record;
        }
        name.strip_prefix(DAY_LOG_PREFIX)
            .and_then(|rest| rest.strip_suffix(&format!(".{DAY_LOG_EXTENSION}")))
            .and_then(|date| NaiveDate::parse_from_str(date, DAY_LOG_DATE_FORMAT).ok())
            .map_or(StoredFile::Other, StoredFile::DayLog)
    }

    async fn remove(path: &Path) -> bool {
        match fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to delete expired fault file");
                false
            }
        }
    }
}

#[async_trait]
impl FaultStore for FileFaultStore {
    #[instrument(skip_all, fields(fault_id = %record.id))]
    async fn save(&self, record: &FaultRecord) -> Result<()> {
        self.ensure_dir().await?;
        let path = self.record_path(record.id);
        let json = serde_json::to_vec_pretty(record).map_err(InfraError::from)?;
        fs::write(&path, json).await.map_err(|e| InfraError::io_at(&path, e))?;
        Ok(())
    }

    async fn append_day_log(&self, record: &FaultRecord) -> Result<()> {
        self.ensure_dir().await?;
        let path = self.day_log_path(record.timestamp.date_naive());
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| InfraError::io_at(&path, e))?;

        let line = format!("{}\n", record.day_log_line());
        file.write_all(line.as_bytes()).await.map_err(|e| InfraError::io_at(&path, e))?;
        file.flush().await.map_err(|e| InfraError::io_at(&path, e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<FaultRecord>> {
        let mut records = Vec::new();
        for path in self.entries().await? {
            if !matches!(Self::classify(&path), StoredFile::Record) {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(record) if record.timestamp >= cutoff => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable fault record");
                }
            }
        }
        debug!(count = records.len(), "Loaded persisted fault records");
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff_day = cutoff.date_naive();
        let mut removed = 0;

        for path in self.entries().await? {
            let expired = match Self::classify(&path) {
                StoredFile::Record => {
                    Self::record_timestamp(&path).await.is_some_and(|at| at < cutoff)
                }
                // A day log only expires once its whole day is behind the cutoff
                StoredFile::DayLog(day) => day < cutoff_day,
                StoredFile::Other => false,
            };
            if expired && Self::remove(&path).await {
                removed += 1;
            }
        }

        debug!(removed, "Purged expired fault files");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_layout() {
        let store = FileFaultStore::new("/data/faults");
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date");

        assert_eq!(store.day_log_path(date), PathBuf::from("/data/faults/faults-2026-10-19.log"));
        assert_eq!(
            store.record_path(Uuid::nil()),
            PathBuf::from("/data/faults/00000000-0000-0000-0000-000000000000.json")
        );
    }

    #[test]
    fn test_classify_recognises_files() {
        assert!(matches!(FileFaultStore::classify(Path::new("/d/abc.json")), StoredFile::Record));
        assert!(matches!(
            FileFaultStore::classify(Path::new("/d/faults-2026-01-02.log")),
            StoredFile::DayLog(day) if day == NaiveDate::from_ymd_opt(2026, 1, 2).expect("valid")
        ));
        assert!(matches!(
            FileFaultStore::classify(Path::new("/d/faults-latest.log")),
            StoredFile::Other
        ));
        assert!(matches!(FileFaultStore::classify(Path::new("/d/notes.txt")), StoredFile::Other));
    }
}
