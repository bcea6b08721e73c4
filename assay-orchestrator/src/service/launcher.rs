//! Job Launcher
//!
//! Validates a submission, writes the initial `pending` record and hands
//! the job to the executor without waiting for the upstream call.

use assay_core::domain::job::{
    JobFailure, JobPatch, JobStatus, RequestPatch, is_valid_job_id, new_job_id,
};
use assay_core::dto::job::{ExecuteJob, StartJob, StartJobResponse};
use reqwest::Method;
use reqwest::header::HeaderMap;
use tracing::{error, info};

use crate::repository::job_repository;
use crate::service::dispatch::Dispatcher;
use crate::store::{RecordStore, StoreError};

/// Service error type
#[derive(Debug)]
pub enum LaunchError {
    ValidationError(String),
    /// No record could be written; nothing exists to poll
    StoreError(StoreError),
    /// The record exists and has been marked `failed`
    DispatchFailed { job_id: String, message: String },
}

impl From<StoreError> for LaunchError {
    fn from(err: StoreError) -> Self {
        LaunchError::StoreError(err)
    }
}

/// Accept a submission and trigger its execution
pub async fn launch_job(
    store: &dyn RecordStore,
    dispatcher: &dyn Dispatcher,
    req: StartJob,
    headers: HeaderMap,
) -> Result<StartJobResponse, LaunchError> {
    validate_submission(&req)?;

    let job_id = req.job_id.clone().unwrap_or_else(new_job_id);

    job_repository::create(
        store,
        &job_id,
        RequestPatch {
            endpoint: Some(req.request.endpoint.trim().to_string()),
            method: Some(req.request.method_or_default()),
            metadata: req.metadata.clone(),
        },
    )
    .await?;

    info!("Job {} accepted for {}", job_id, req.request.endpoint);

    let execute = ExecuteJob::from_start(job_id.clone(), req);

    if let Err(e) = dispatcher.dispatch(execute, headers).await {
        let message = format!("Failed to trigger background execution: {}", e);
        error!("Job {}: {}", job_id, message);

        let failed = JobPatch::status(JobStatus::Failed).with_error(JobFailure::new(message.clone()));
        if let Err(store_err) = job_repository::merge_patch(store, &job_id, failed).await {
            error!("Failed to mark job {} failed: {}", job_id, store_err);
        }

        return Err(LaunchError::DispatchFailed { job_id, message });
    }

    Ok(StartJobResponse { job_id })
}

// =============================================================================
// Validation
// =============================================================================

fn validate_submission(req: &StartJob) -> Result<(), LaunchError> {
    if let Some(job_id) = &req.job_id {
        if !is_valid_job_id(job_id) {
            return Err(LaunchError::ValidationError(format!(
                "Invalid jobId '{}': expected 1-128 characters of [A-Za-z0-9_-]",
                job_id
            )));
        }
    }

    if req.request.endpoint.trim().is_empty() {
        return Err(LaunchError::ValidationError(
            "request.endpoint is required".to_string(),
        ));
    }

    let method = req.request.method_or_default();
    if Method::from_bytes(method.as_bytes()).is_err() {
        return Err(LaunchError::ValidationError(format!(
            "Invalid request.method '{}'",
            method
        )));
    }

    Ok(())
}
