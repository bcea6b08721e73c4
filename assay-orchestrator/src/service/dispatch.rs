//! Executor dispatch
//!
//! Fire-and-forget hand-off from the launcher to the executor. A dispatcher
//! only confirms the work was accepted; completion is observed through the
//! record store.

use assay_core::dto::job::ExecuteJob;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::service::executor::{Executor, forwarded_headers};

/// Why a trigger was not accepted
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("executor trigger request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("executor rejected trigger (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Hands a job to the executor without waiting for it to finish
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, job: ExecuteJob, headers: HeaderMap) -> Result<(), DispatchError>;
}

/// Triggers a remote executor over HTTP (`POST {url}/jobs/execute`)
pub struct HttpDispatcher {
    client: Client,
    execute_url: String,
}

impl HttpDispatcher {
    /// # Arguments
    /// * `executor_url` - Base URL of the executor deployment
    /// * `timeout` - How long to wait for the trigger to be accepted
    pub fn new(executor_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            execute_url: format!("{}/jobs/execute", executor_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, job: ExecuteJob, headers: HeaderMap) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.execute_url)
            .headers(forwarded_headers(&headers))
            .json(&job)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Executor accepted job {}", job.job_id);
        Ok(())
    }
}

/// Runs the executor on a task of this process
pub struct LocalDispatcher {
    executor: Arc<Executor>,
}

impl LocalDispatcher {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Dispatcher for LocalDispatcher {
    async fn dispatch(&self, job: ExecuteJob, headers: HeaderMap) -> Result<(), DispatchError> {
        let executor = Arc::clone(&self.executor);
        let headers = forwarded_headers(&headers);

        tokio::spawn(async move {
            executor.execute(job, headers).await;
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assay_core::dto::job::UpstreamCall;
    use httpmock::MockServer;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    fn job() -> ExecuteJob {
        ExecuteJob {
            job_id: "abc".to_string(),
            request: UpstreamCall {
                endpoint: "/x".to_string(),
                method: None,
                body: None,
            },
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_http_dispatch_forwards_credentials() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/jobs/execute")
                    .header("x-api-key", "k")
                    .json_body(json!({"jobId": "abc", "request": {"endpoint": "/x"}}));
                then.status(200)
                    .json_body(json!({"accepted": true, "jobId": "abc"}));
            })
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("k"));

        let dispatcher = HttpDispatcher::new(&server.base_url(), Duration::from_secs(5)).unwrap();
        dispatcher.dispatch(job(), headers).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_dispatch_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST").path("/jobs/execute");
                then.status(503).body("busy");
            })
            .await;

        let dispatcher = HttpDispatcher::new(&server.base_url(), Duration::from_secs(5)).unwrap();
        match dispatcher.dispatch(job(), HeaderMap::new()).await {
            Err(DispatchError::Rejected { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "busy");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_dispatch_unreachable() {
        let dispatcher = HttpDispatcher::new("http://127.0.0.1:1", Duration::from_secs(5)).unwrap();
        assert!(matches!(
            dispatcher.dispatch(job(), HeaderMap::new()).await,
            Err(DispatchError::Request(_))
        ));
    }
}
