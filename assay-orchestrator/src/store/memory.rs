//! In-memory store tier
//!
//! Last resort when no durable tier opens. State is lost on restart and is
//! invisible to other processes.

use assay_core::domain::job::JobRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{RecordStore, StoreBackend, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    async fn get(&self, key: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, record: &JobRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.records.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_round_trip() {
        let store = MemoryStore::new();
        let record = JobRecord::skeleton("abc", Utc::now());

        assert_eq!(store.get("abc").await.unwrap(), None);
        store.set("abc", &record).await.unwrap();
        assert_eq!(store.get("abc").await.unwrap(), Some(record));
        assert_eq!(store.list_keys().await.unwrap(), vec!["abc"]);

        store.delete("abc").await.unwrap();
        assert!(store.list_keys().await.unwrap().is_empty());
    }
}
