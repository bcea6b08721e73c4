//! Job Repository
//!
//! Lifecycle operations over job records. The only mutation primitive is
//! merge-patch: read the stored record (or a fresh `pending` skeleton),
//! merge the patch, stamp timestamps, write the result back.
//!
//! There is no locking. Two concurrent patches to the same job race and the
//! last write wins; callers avoid this by having a single writer per job.

use assay_core::domain::job::{JobPatch, JobRecord, JobStatus, RequestPatch};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::store::{RecordStore, StoreError};

/// Merge a partial record into the stored one and persist it.
///
/// Terminal records are immutable: a patch against one is dropped and the
/// stored record is returned unchanged.
pub async fn merge_patch(
    store: &dyn RecordStore,
    job_id: &str,
    patch: JobPatch,
) -> Result<JobRecord, StoreError> {
    let now = Utc::now();
    let existing = store.get(job_id).await?;

    if let Some(record) = existing.as_ref().filter(|r| r.is_terminal()) {
        warn!(
            "Ignoring patch to job {} which is already {}",
            job_id, record.status
        );
        return Ok(record.clone());
    }

    let merged = existing
        .unwrap_or_else(|| JobRecord::skeleton(job_id, now))
        .merged(patch, now);

    store.set(job_id, &merged).await?;

    debug!("Job {} is now {}", job_id, merged.status);

    Ok(merged)
}

/// Write the initial `pending` record for a submission
pub async fn create(
    store: &dyn RecordStore,
    job_id: &str,
    request: RequestPatch,
) -> Result<JobRecord, StoreError> {
    merge_patch(
        store,
        job_id,
        JobPatch::status(JobStatus::Pending).with_request(request),
    )
    .await
}

/// Find a job by ID
pub async fn find_by_id(store: &dyn RecordStore, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
    store.get(job_id).await
}

/// Delete a job by ID; deleting an unknown job succeeds
pub async fn delete(store: &dyn RecordStore, job_id: &str) -> Result<(), StoreError> {
    store.delete(job_id).await
}

/// All live job IDs
pub async fn list_ids(store: &dyn RecordStore) -> Result<Vec<String>, StoreError> {
    store.list_keys().await
}

/// All live records; keys deleted between listing and reading are skipped
pub async fn list_all(store: &dyn RecordStore) -> Result<Vec<JobRecord>, StoreError> {
    let mut records = Vec::new();
    for key in store.list_keys().await? {
        if let Some(record) = store.get(&key).await? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Delete terminal records completed before `cutoff`, returning their IDs
pub async fn purge_terminal(
    store: &dyn RecordStore,
    cutoff: DateTime<Utc>,
) -> Result<Vec<String>, StoreError> {
    let mut deleted = Vec::new();

    for record in list_all(store).await? {
        let expired = record.is_terminal()
            && record.completed_at.unwrap_or(record.updated_at) < cutoff;

        if expired {
            store.delete(&record.job_id).await?;
            deleted.push(record.job_id);
        }
    }

    Ok(deleted)
}
