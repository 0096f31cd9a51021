//! File registry: task id -> [`FileRecord`].
//!
//! The JSON implementation keeps the whole map in memory and rewrites the
//! document in full on every mutation. Writers serialize on one async mutex
//! held across the rewrite, and each rewrite goes to a sibling temp file that
//! is renamed over the original, so readers of the file never see a torn
//! document.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vmark_models::{FileRecord, TaskId};

use crate::error::{StorageError, StorageResult};

/// Durable store of completed outputs.
#[async_trait]
pub trait FileRegistry: Send + Sync {
    /// Insert or replace the record for `record.id`.
    async fn register(&self, record: FileRecord) -> StorageResult<()>;

    async fn get(&self, id: &TaskId) -> StorageResult<Option<FileRecord>>;

    /// All records, newest first.
    async fn list(&self) -> StorageResult<Vec<FileRecord>>;

    /// Remove a record and delete its processed artifact.
    async fn remove(&self, id: &TaskId) -> StorageResult<FileRecord>;
}

/// Registry persisted as a single JSON object keyed by task id.
pub struct JsonFileRegistry {
    path: PathBuf,
    processed_dir: PathBuf,
    records: Mutex<BTreeMap<TaskId, FileRecord>>,
}

impl JsonFileRegistry {
    /// Load the registry at `path`. A missing file starts empty; an
    /// unreadable or corrupt one is logged and also starts empty.
    pub async fn open(path: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match load_records(&path).await {
            Ok(records) => {
                info!(path = %path.display(), count = records.len(), "Loaded file registry");
                records
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not load file registry, starting empty");
                BTreeMap::new()
            }
        };

        Self {
            path,
            processed_dir: processed_dir.into(),
            records: Mutex::new(records),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of a record's processed artifact.
    pub fn artifact_path(&self, record: &FileRecord) -> PathBuf {
        self.processed_dir.join(&record.processed_name)
    }

    async fn persist(&self, records: &BTreeMap<TaskId, FileRecord>) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(records)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &self.path).await.map_err(|e| {
            StorageError::write_failed(format!("{}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), count = records.len(), "Registry saved");
        Ok(())
    }
}

async fn load_records(path: &Path) -> StorageResult<BTreeMap<TaskId, FileRecord>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl FileRegistry for JsonFileRegistry {
    async fn register(&self, record: FileRecord) -> StorageResult<()> {
        let mut records = self.records.lock().await;
        let previous = records.insert(record.id.clone(), record.clone());

        if let Err(e) = self.persist(&records).await {
            // Keep memory and disk in agreement
            match previous {
                Some(prev) => records.insert(record.id.clone(), prev),
                None => records.remove(&record.id),
            };
            return Err(e);
        }

        info!(task_id = %record.id, size = record.size, "Registered output file");
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> StorageResult<Option<FileRecord>> {
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn list(&self) -> StorageResult<Vec<FileRecord>> {
        let mut all: Vec<FileRecord> = self.records.lock().await.values().cloned().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(all)
    }

    async fn remove(&self, id: &TaskId) -> StorageResult<FileRecord> {
        let mut records = self.records.lock().await;
        let record = records
            .remove(id)
            .ok_or_else(|| StorageError::not_found(id.as_str()))?;

        if let Err(e) = self.persist(&records).await {
            records.insert(id.clone(), record);
            return Err(e);
        }

        let artifact = self.artifact_path(&record);
        match fs::remove_file(&artifact).await {
            Ok(()) => debug!(path = %artifact.display(), "Deleted processed file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %artifact.display(), error = %e, "Could not delete processed file"),
        }

        info!(task_id = %id, "Removed output file");
        Ok(record)
    }
}
