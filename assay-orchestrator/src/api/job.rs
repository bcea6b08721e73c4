//! Job API Handlers
//!
//! HTTP endpoints for submitting, executing and polling jobs.

use assay_core::domain::job::{JobRecord, is_valid_job_id};
use assay_core::dto::job::{
    ExecuteAccepted, ExecuteJob, JobIdList, PurgeResponse, StartJob, StartJobResponse,
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::executor::forwarded_headers;
use crate::service::{launcher_service, status_service};

// =============================================================================
// Job Lifecycle Endpoints
// =============================================================================

/// POST /jobs/start
/// Accept a submission and trigger background execution
pub async fn start_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<StartJob>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StartJobResponse>)> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    tracing::info!("Starting job for endpoint: {}", req.request.endpoint);

    let response = launcher_service::launch_job(
        state.store.as_ref(),
        state.dispatcher.as_ref(),
        req,
        headers,
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// POST /jobs/execute
/// Internal trigger: accept the job and run it on a background task.
/// The upstream outcome is recorded in the store, never in this response.
pub async fn execute_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ExecuteJob>, JsonRejection>,
) -> ApiResult<Json<ExecuteAccepted>> {
    let Json(job) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if !is_valid_job_id(&job.job_id) {
        return Err(ApiError::BadRequest(format!("Invalid jobId '{}'", job.job_id)));
    }

    if job.request.endpoint.trim().is_empty() {
        return Err(ApiError::BadRequest("request.endpoint is required".to_string()));
    }

    tracing::info!("Executor accepted job: {}", job.job_id);

    let job_id = job.job_id.clone();
    let executor = Arc::clone(&state.executor);
    let headers = forwarded_headers(&headers);

    tokio::spawn(async move {
        executor.execute(job, headers).await;
    });

    Ok(Json(ExecuteAccepted {
        accepted: true,
        job_id,
    }))
}

/// GET /jobs/status?jobId=..
/// Get the current record of a job
pub async fn get_job_status(
    State(state): State<AppState>,
    Query(params): Query<StatusQuery>,
) -> ApiResult<Json<JobRecord>> {
    let job_id = params
        .job_id
        .ok_or_else(|| ApiError::BadRequest("jobId query parameter is required".to_string()))?;

    tracing::debug!("Getting status of job: {}", job_id);

    let cleanup = params.cleanup.unwrap_or(state.cleanup_on_read);
    let record = status_service::get_status(state.store.as_ref(), &job_id, cleanup).await?;

    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "jobId")]
    pub job_id: Option<String>,
    pub cleanup: Option<bool>,
}

// =============================================================================
// Maintenance Endpoints
// =============================================================================

/// GET /jobs
/// List all live job IDs
pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<JobIdList>> {
    tracing::debug!("Listing jobs");

    let job_ids = status_service::list_job_ids(state.store.as_ref()).await?;

    Ok(Json(JobIdList { job_ids }))
}

/// DELETE /jobs/{job_id}
/// Delete a job record
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting job: {}", job_id);

    status_service::delete_job(state.store.as_ref(), &job_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /jobs/purge?olderThanSecs=N
/// Delete terminal jobs completed more than N seconds ago
pub async fn purge_jobs(
    State(state): State<AppState>,
    Query(params): Query<PurgeQuery>,
) -> ApiResult<Json<PurgeResponse>> {
    let older_than = chrono::Duration::seconds(params.older_than_secs.unwrap_or(0) as i64);
    let cutoff = chrono::Utc::now() - older_than;

    tracing::info!("Purging terminal jobs completed before {}", cutoff);

    let deleted = status_service::purge_jobs(state.store.as_ref(), cutoff).await?;

    Ok(Json(PurgeResponse { deleted }))
}

#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
    #[serde(rename = "olderThanSecs")]
    pub older_than_secs: Option<u32>,
}
