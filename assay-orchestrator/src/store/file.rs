//! File store tier
//!
//! A single JSON object `{ jobId: record }` on local disk. Every operation
//! reads and rewrites the whole document, so it is only fit for one host.
//! Operations within this process are serialized; separate processes
//! writing the same file can still race.

use assay_core::domain::job::JobRecord;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use super::{RecordStore, StoreBackend, StoreError};

type Document = BTreeMap<String, JobRecord>;

/// Local JSON file backend
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Opens the document, creating it (and its directory) when absent.
    ///
    /// An existing file must parse, otherwise opening fails.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let store = Self {
            path,
            lock: Mutex::new(()),
        };

        if fs::try_exists(&store.path).await? {
            store.read_document().await?;
        } else {
            store.write_document(&Document::new()).await?;
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Document, StoreError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Document::new());
        }

        Ok(serde_json::from_str(&contents)?)
    }

    /// Writes to a sibling temp file, then renames over the document
    async fn write_document(&self, document: &Document) -> Result<(), StoreError> {
        let contents = serde_json::to_vec_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, &self.path).await?;

        Ok(())
    }
}

#[async_trait]
impl RecordStore for FileStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::File
    }

    async fn get(&self, key: &str) -> Result<Option<JobRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        Ok(document.remove(key))
    }

    async fn set(&self, key: &str, record: &JobRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        document.insert(key.to_string(), record.clone());
        self.write_document(&document).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        if document.remove(key).is_some() {
            self.write_document(&document).await?;
        }
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let document = self.read_document().await?;
        Ok(document.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assay_core::domain::job::{JobPatch, JobStatus};
    use chrono::Utc;

    fn record(id: &str) -> JobRecord {
        JobRecord::skeleton(id, Utc::now()).merged(JobPatch::status(JobStatus::Running), Utc::now())
    }

    #[tokio::test]
    async fn test_open_creates_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobs.json");

        let store = FileStore::open(&path).await.unwrap();

        assert_eq!(std::fs::read_to_string(store.path()).unwrap().trim(), "{}");
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileStore::open(&path).await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_round_trip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("jobs.json")).await.unwrap();

        store.set("a", &record("a")).await.unwrap();
        store.set("b", &record("b")).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap().job_id, "a");
        assert_eq!(store.list_keys().await.unwrap(), vec!["a", "b"]);

        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.list_keys().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");

        let first = FileStore::open(&path).await.unwrap();
        first.set("abc", &record("abc")).await.unwrap();
        drop(first);

        let second = FileStore::open(&path).await.unwrap();
        assert!(second.get("abc").await.unwrap().is_some());
    }
}
