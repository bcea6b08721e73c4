//! Background Executor
//!
//! The only component that talks to the upstream analysis API. Runs one
//! job per invocation, holds nothing beyond that invocation, and records
//! every outcome in the store: it never reports failure to its caller.

use assay_core::domain::job::{
    JobFailure, JobPatch, JobStatus, RequestPatch, UpstreamResult,
};
use assay_core::dto::job::ExecuteJob;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::repository::job_repository;
use crate::store::SharedStore;

/// Request headers passed through to the upstream API
pub const FORWARDED_HEADERS: [&str; 4] = [
    "authorization",
    "x-api-key",
    "x-organization-id",
    "x-environment-id",
];

/// Keeps only the allow-listed headers
pub fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for name in FORWARDED_HEADERS {
        let name = HeaderName::from_static(name);
        for value in headers.get_all(&name) {
            forwarded.append(name.clone(), value.clone());
        }
    }
    forwarded
}

/// Joins relative endpoints onto the upstream base URL
pub fn resolve_endpoint(endpoint: &str, base_url: Option<&str>) -> Result<String, String> {
    let endpoint = endpoint.trim();
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Ok(endpoint.to_string());
    }

    let base = base_url.ok_or_else(|| {
        format!(
            "Endpoint '{}' is relative and no upstream base URL is configured",
            endpoint
        )
    })?;

    Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    ))
}

/// Raw upstream answer, before it is turned into a record patch
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub raw_body: String,
}

/// Builds the terminal patch for an upstream answer.
///
/// 2xx completes the job; anything else fails it while keeping the result.
pub fn outcome_patch(response: UpstreamResponse, duration: Duration) -> JobPatch {
    let parsed: Option<JsonValue> = serde_json::from_str(&response.raw_body).ok();
    let status_code = StatusCode::from_u16(response.status).ok();
    let success = status_code.is_some_and(|s| s.is_success());

    let result = UpstreamResult {
        status: response.status,
        status_text: status_code
            .and_then(|s| s.canonical_reason())
            .map(str::to_string),
        body: parsed.clone(),
        weight_bytes: Some(response.raw_body.len() as u64),
        raw_body: Some(response.raw_body.clone()),
    };

    let duration_ms = duration.as_millis() as u64;

    if success {
        return JobPatch::status(JobStatus::Completed)
            .with_result(result)
            .with_duration_ms(duration_ms);
    }

    let message = parsed
        .as_ref()
        .and_then(|body| body.get("message"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Upstream request failed with status {}", response.status));

    let details = match parsed {
        Some(body) => Some(body),
        None if !response.raw_body.is_empty() => Some(JsonValue::String(response.raw_body)),
        None => None,
    };

    let mut failure = JobFailure::new(message);
    failure.details = details;

    JobPatch::status(JobStatus::Failed)
        .with_result(result)
        .with_error(failure)
        .with_duration_ms(duration_ms)
}

/// Executes jobs against the upstream API
pub struct Executor {
    store: SharedStore,
    client: Client,
    upstream_base_url: Option<String>,
}

impl Executor {
    pub fn new(store: SharedStore, client: Client, upstream_base_url: Option<String>) -> Self {
        Self {
            store,
            client,
            upstream_base_url,
        }
    }

    /// Builds an executor whose upstream calls give up after `timeout`
    pub fn with_timeout(
        store: SharedStore,
        upstream_base_url: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new(store, client, upstream_base_url))
    }

    /// Runs one job to a terminal record
    pub async fn execute(&self, job: ExecuteJob, headers: HeaderMap) {
        let job_id = job.job_id.clone();

        match job_repository::find_by_id(self.store.as_ref(), &job_id).await {
            Ok(Some(record)) if record.status != JobStatus::Pending => {
                warn!(
                    "Job {} is already {}, skipping duplicate execution",
                    job_id, record.status
                );
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to read job {} before execution: {}", job_id, e);
                return;
            }
        }

        let running = JobPatch::status(JobStatus::Running).with_request(RequestPatch {
            endpoint: Some(job.request.endpoint.clone()),
            method: Some(job.request.method_or_default()),
            metadata: job.metadata.clone(),
        });

        match job_repository::merge_patch(self.store.as_ref(), &job_id, running).await {
            Ok(record) if record.status == JobStatus::Running => {}
            Ok(record) => {
                // Finished while this trigger was in flight
                warn!(
                    "Job {} became {} before execution started, skipping",
                    job_id, record.status
                );
                return;
            }
            Err(e) => {
                error!("Failed to mark job {} running: {}", job_id, e);
                return;
            }
        }

        info!("Executing job {}: {}", job_id, job.request.endpoint);

        let patch = self.call_upstream(&job, &headers).await;

        match job_repository::merge_patch(self.store.as_ref(), &job_id, patch).await {
            Ok(record) => info!("Job {} finished as {}", job_id, record.status),
            Err(e) => error!("Failed to record outcome of job {}: {}", job_id, e),
        }
    }

    async fn call_upstream(&self, job: &ExecuteJob, headers: &HeaderMap) -> JobPatch {
        let started = Instant::now();

        let url = match resolve_endpoint(&job.request.endpoint, self.upstream_base_url.as_deref()) {
            Ok(url) => url,
            Err(message) => return failed_without_response(message, started.elapsed()),
        };

        let method = match Method::from_bytes(job.request.method_or_default().as_bytes()) {
            Ok(method) => method,
            Err(e) => return failed_without_response(format!("Invalid method: {}", e), started.elapsed()),
        };

        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(forwarded_headers(headers))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if method != Method::GET && method != Method::HEAD {
            if let Some(body) = &job.request.body {
                request = request.body(body.to_string());
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return failed_without_response(e.to_string(), started.elapsed()),
        };

        let status = response.status().as_u16();
        let raw_body = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                let mut patch = failed_without_response(
                    format!("Failed to read upstream response: {}", e),
                    started.elapsed(),
                );
                patch.result = Some(UpstreamResult {
                    status,
                    ..UpstreamResult::default()
                });
                return patch;
            }
        };

        outcome_patch(UpstreamResponse { status, raw_body }, started.elapsed())
    }
}

fn failed_without_response(message: String, duration: Duration) -> JobPatch {
    JobPatch::status(JobStatus::Failed)
        .with_error(JobFailure::new(message))
        .with_duration_ms(duration.as_millis() as u64)
}
