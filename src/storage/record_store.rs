use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use super::models::{RecordBody, StoredRecord};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(u64),

    #[error("Data directory not found")]
    DataDirNotFound,
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Durable keyed storage for encrypted records.
///
/// Implementations know nothing about encryption. Every method resolves only
/// once its change is committed.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records in insertion order
    async fn get_all(&self) -> Result<Vec<StoredRecord>>;

    /// Insert a record and return its newly assigned id
    async fn add(&self, body: RecordBody) -> Result<u64>;

    /// Insert or overwrite the record with `record.id`
    async fn put(&self, record: StoredRecord) -> Result<()>;

    /// Remove a record. Removing a missing id is not an error.
    async fn delete(&self, id: u64) -> Result<()>;

    /// Remove every record. Ids are not reused afterwards.
    async fn clear(&self) -> Result<()>;

    /// Replace the whole collection, returning the new ids in order.
    ///
    /// The default clears and re-adds one by one; backends that can commit
    /// the swap in one step override it.
    async fn replace_all(&self, bodies: Vec<RecordBody>) -> Result<Vec<u64>> {
        self.clear().await?;
        let mut ids = Vec::with_capacity(bodies.len());
        for body in bodies {
            ids.push(self.add(body).await?);
        }
        Ok(ids)
    }

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.get_all().await?.is_empty())
    }
}

/// On-disk layout of the record file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordFile {
    next_id: u64,
    /// Kept sorted by id
    records: Vec<StoredRecord>,
}

impl RecordFile {
    fn allocate_id(&mut self) -> u64 {
        // Ids start at 1, like an auto-increment key
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert(&mut self, record: StoredRecord) {
        self.next_id = self.next_id.max(record.id + 1);
        match self.records.binary_search_by_key(&record.id, |r| r.id) {
            Ok(pos) => self.records[pos] = record,
            Err(pos) => self.records.insert(pos, record),
        }
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        self.records.len() != before
    }

    fn push_new(&mut self, body: RecordBody) -> u64 {
        let id = self.allocate_id();
        self.insert(StoredRecord { id, body });
        id
    }

    fn replace_all(&mut self, bodies: Vec<RecordBody>) -> Vec<u64> {
        self.records.clear();
        bodies.into_iter().map(|body| self.push_new(body)).collect()
    }
}

/// Record store backed by a single JSON file.
///
/// Each mutation rewrites a temporary sibling file and renames it over the
/// original, so readers see either the previous or the next collection.
pub struct FileRecordStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl FileRecordStore {
    pub const FILE_NAME: &'static str = "shortcuts.json";

    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(Self::FILE_NAME),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<RecordFile> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(RecordFile::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RecordFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, file: &RecordFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_vec_pretty(file)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut tmp = tokio::fs::File::create(&tmp_path).await?;
        tokio::io::AsyncWriteExt::write_all(&mut tmp, &content).await?;
        tmp.sync_all().await?;
        drop(tmp);

        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get_all(&self) -> Result<Vec<StoredRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_file().await?.records)
    }

    async fn add(&self, body: RecordBody) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let mut file = self.read_file().await?;
        let id = file.push_new(body);
        self.write_file(&file).await?;
        Ok(id)
    }

    async fn put(&self, record: StoredRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.read_file().await?;
        file.insert(record);
        self.write_file(&file).await
    }

    async fn delete(&self, id: u64) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.read_file().await?;
        if file.remove(id) {
            self.write_file(&file).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.read_file().await?;
        file.records.clear();
        self.write_file(&file).await
    }

    async fn replace_all(&self, bodies: Vec<RecordBody>) -> Result<Vec<u64>> {
        let _guard = self.lock.lock().await;
        let mut file = self.read_file().await?;
        let ids = file.replace_all(bodies);

        // Single rename: the old and new collections are never mixed on disk
        self.write_file(&file).await?;
        Ok(ids)
    }
}

/// In-process record store, used by tests and embedders without a data dir
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<RecordFile>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_all(&self) -> Result<Vec<StoredRecord>> {
        Ok(self.inner.lock().await.records.clone())
    }

    async fn add(&self, body: RecordBody) -> Result<u64> {
        Ok(self.inner.lock().await.push_new(body))
    }

    async fn put(&self, record: StoredRecord) -> Result<()> {
        self.inner.lock().await.insert(record);
        Ok(())
    }

    async fn delete(&self, id: u64) -> Result<()> {
        self.inner.lock().await.remove(id);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.inner.lock().await.records.clear();
        Ok(())
    }

    async fn replace_all(&self, bodies: Vec<RecordBody>) -> Result<Vec<u64>> {
        Ok(self.inner.lock().await.replace_all(bodies))
    }
}
