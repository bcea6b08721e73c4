//! Job poller
//!
//! Submits a job and polls its status with capped exponential backoff until
//! the record is terminal, the caller's timeout elapses or the caller
//! cancels. A `failed` record is a job outcome and is returned as `Ok`.

use assay_core::backoff::{
    BACKOFF_FACTOR, Backoff, DEFAULT_POLL_TIMEOUT, INITIAL_POLL_INTERVAL, MAX_POLL_INTERVAL,
};
use assay_core::domain::job::{JobRecord, new_job_id};
use assay_core::dto::job::{StartJob, StartJobResponse, UpstreamCall};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::AssayClient;
use crate::error::{ClientError, Result};

/// The two orchestrator calls the poll loop depends on
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn start_job(&self, req: &StartJob, api_key: Option<&str>) -> Result<StartJobResponse>;

    /// `None` while the job is not yet visible
    async fn get_job_status(&self, job_id: &str) -> Result<Option<JobRecord>>;
}

#[async_trait]
impl JobApi for AssayClient {
    async fn start_job(&self, req: &StartJob, api_key: Option<&str>) -> Result<StartJobResponse> {
        AssayClient::start_job(self, req, api_key).await
    }

    async fn get_job_status(&self, job_id: &str) -> Result<Option<JobRecord>> {
        AssayClient::get_job_status(self, job_id).await
    }
}

/// Why the poll loop gave up
#[derive(Debug, Error)]
pub enum PollError {
    /// The launcher did not accept the job; there is nothing to poll
    #[error("Failed to submit job: {0}")]
    Submission(#[source] ClientError),

    /// The status endpoint failed or answered unexpectedly
    #[error("Failed to poll job {job_id}: {source}")]
    Polling {
        job_id: String,
        #[source]
        source: ClientError,
    },

    /// Stopped waiting; the job may still finish server-side
    #[error("Timed out after {elapsed:?} waiting for job {job_id}")]
    Timeout { job_id: String, elapsed: Duration },

    #[error("Polling for job {job_id} was cancelled")]
    Cancelled { job_id: String },
}

impl PollError {
    /// The job this error refers to, if one was accepted
    pub fn job_id(&self) -> Option<&str> {
        match self {
            PollError::Submission(_) => None,
            PollError::Polling { job_id, .. }
            | PollError::Timeout { job_id, .. }
            | PollError::Cancelled { job_id } => Some(job_id),
        }
    }
}

/// Everything `run_validation_job` needs
#[derive(Debug, Clone)]
pub struct ValidationJobOptions {
    /// Upstream endpoint, relative to the executor's base URL or absolute
    pub endpoint_path: String,
    pub payload: JsonValue,
    pub api_key: Option<String>,
    pub metadata: Option<JsonValue>,
    /// Upstream HTTP method, `POST` when unset
    pub method: Option<String>,
    /// First delay between polls
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
    /// Measured from the submission
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

impl ValidationJobOptions {
    pub fn new(endpoint_path: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            endpoint_path: endpoint_path.into(),
            payload,
            api_key: None,
            metadata: None,
            method: None,
            poll_interval: INITIAL_POLL_INTERVAL,
            max_poll_interval: MAX_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Submit a job and wait for its terminal record
pub async fn run_validation_job<A>(
    api: &A,
    options: ValidationJobOptions,
) -> std::result::Result<JobRecord, PollError>
where
    A: JobApi + ?Sized,
{
    let local_id = new_job_id();

    if options.cancel.is_cancelled() {
        return Err(PollError::Cancelled { job_id: local_id });
    }

    let submission = StartJob {
        job_id: Some(local_id.clone()),
        request: UpstreamCall {
            endpoint: options.endpoint_path,
            method: options.method,
            body: Some(options.payload),
        },
        metadata: options.metadata,
    };

    // Each request is bounded by what is left of the timeout
    let started = Instant::now();
    let submitted = timeout(
        options.timeout,
        api.start_job(&submission, options.api_key.as_deref()),
    )
    .await;

    let job_id = match submitted {
        Ok(response) => response.map_err(PollError::Submission)?.job_id,
        Err(_) => {
            return Err(PollError::Timeout {
                job_id: local_id,
                elapsed: started.elapsed(),
            });
        }
    };

    info!("Job {} submitted, polling for completion", job_id);

    let mut backoff = Backoff::new(
        options.poll_interval,
        BACKOFF_FACTOR,
        options.max_poll_interval,
    );

    loop {
        if options.cancel.is_cancelled() {
            return Err(PollError::Cancelled { job_id });
        }

        let elapsed = started.elapsed();
        if elapsed >= options.timeout {
            return Err(PollError::Timeout { job_id, elapsed });
        }

        let remaining = options.timeout.saturating_sub(elapsed);
        let status = match timeout(remaining, api.get_job_status(&job_id)).await {
            Ok(status) => status,
            Err(_) => {
                let elapsed = started.elapsed();
                return Err(PollError::Timeout { job_id, elapsed });
            }
        };

        match status {
            Ok(Some(record)) if record.is_terminal() => {
                info!("Job {} finished as {}", job_id, record.status);
                return Ok(record);
            }
            Ok(Some(record)) => debug!("Job {} is {}", job_id, record.status),
            Ok(None) => debug!("Job {} not visible yet", job_id),
            Err(source) => return Err(PollError::Polling { job_id, source }),
        }

        // Never sleep past the deadline
        let remaining = options.timeout.saturating_sub(started.elapsed());
        let delay = backoff.next_delay().min(remaining);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = options.cancel.cancelled() => {
                return Err(PollError::Cancelled { job_id });
            }
        }
    }
}
