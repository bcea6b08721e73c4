//! Status Service
//!
//! Read path polled by clients, plus the bulk listing and cleanup
//! operations built on the store's key enumeration.

use assay_core::domain::job::{JobRecord, is_valid_job_id};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::repository::job_repository;
use crate::store::{RecordStore, StoreError};

/// Service error type
#[derive(Debug)]
pub enum StatusError {
    InvalidJobId(String),
    NotFound(String),
    StoreError(StoreError),
}

impl From<StoreError> for StatusError {
    fn from(err: StoreError) -> Self {
        StatusError::StoreError(err)
    }
}

/// Read the current record for a job.
///
/// With `cleanup`, a terminal record is deleted right after it is read, so
/// that response is the only one a client will ever get for it.
pub async fn get_status(
    store: &dyn RecordStore,
    job_id: &str,
    cleanup: bool,
) -> Result<JobRecord, StatusError> {
    validate_job_id(job_id)?;

    let record = job_repository::find_by_id(store, job_id)
        .await?
        .ok_or_else(|| StatusError::NotFound(job_id.to_string()))?;

    if cleanup && record.is_terminal() {
        match job_repository::delete(store, job_id).await {
            Ok(()) => debug!("Deleted terminal job {} after read", job_id),
            Err(e) => warn!("Failed to delete job {} after read: {}", job_id, e),
        }
    }

    Ok(record)
}

/// List all live job IDs
pub async fn list_job_ids(store: &dyn RecordStore) -> Result<Vec<String>, StatusError> {
    Ok(job_repository::list_ids(store).await?)
}

/// Delete a job record regardless of its status
pub async fn delete_job(store: &dyn RecordStore, job_id: &str) -> Result<(), StatusError> {
    validate_job_id(job_id)?;
    job_repository::delete(store, job_id).await?;
    Ok(())
}

/// Delete terminal jobs that completed before `cutoff`
pub async fn purge_jobs(
    store: &dyn RecordStore,
    cutoff: DateTime<Utc>,
) -> Result<Vec<String>, StatusError> {
    let deleted = job_repository::purge_terminal(store, cutoff).await?;
    if !deleted.is_empty() {
        debug!("Purged {} terminal job(s)", deleted.len());
    }
    Ok(deleted)
}

fn validate_job_id(job_id: &str) -> Result<(), StatusError> {
    if is_valid_job_id(job_id) {
        Ok(())
    } else {
        Err(StatusError::InvalidJobId(job_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use assay_core::domain::job::{JobPatch, JobStatus};

    #[tokio::test]
    async fn test_unknown_job_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            get_status(&store, "abc", false).await,
            Err(StatusError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_job_id() {
        let store = MemoryStore::new();
        assert!(matches!(
            get_status(&store, "a/b", false).await,
            Err(StatusError::InvalidJobId(_))
        ));
        assert!(matches!(
            get_status(&store, "", false).await,
            Err(StatusError::InvalidJobId(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_only_deletes_terminal() {
        let store = MemoryStore::new();
        job_repository::merge_patch(&store, "running", JobPatch::status(JobStatus::Running))
            .await
            .unwrap();
        job_repository::merge_patch(&store, "done", JobPatch::status(JobStatus::Completed))
            .await
            .unwrap();

        get_status(&store, "running", true).await.unwrap();
        assert!(store.get("running").await.unwrap().is_some());

        let record = get_status(&store, "done", true).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert!(store.get("done").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_without_cleanup_keeps_record() {
        let store = MemoryStore::new();
        job_repository::merge_patch(&store, "done", JobPatch::status(JobStatus::Failed))
            .await
            .unwrap();

        get_status(&store, "done", false).await.unwrap();
        get_status(&store, "done", false).await.unwrap();
        assert!(store.get("done").await.unwrap().is_some());
    }
}
