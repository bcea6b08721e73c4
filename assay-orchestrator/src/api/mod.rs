//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod job;

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::service::dispatch::Dispatcher;
use crate::service::executor::Executor;
use crate::store::SharedStore;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub executor: Arc<Executor>,
    /// Default for the status endpoint's `cleanup` parameter
    pub cleanup_on_read: bool,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    // Browser clients call these endpoints directly
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job lifecycle endpoints
        .route("/jobs/start", post(job::start_job))
        .route("/jobs/execute", post(job::execute_job))
        .route("/jobs/status", get(job::get_job_status))
        // Maintenance endpoints
        .route("/jobs", get(job::list_jobs))
        .route("/jobs/purge", post(job::purge_jobs))
        .route("/jobs/{job_id}", delete(job::delete_job))
        // Add state and middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::job_repository;
    use crate::service::dispatch::{DispatchError, LocalDispatcher};
    use crate::store::{MemoryStore, RecordStore};
    use assay_core::domain::job::{JobPatch, JobRecord, JobStatus};
    use assay_core::dto::job::ExecuteJob;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode};
    use http_body_util::BodyExt;
    use httpmock::MockServer;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    struct RejectingDispatcher;

    #[async_trait]
    impl Dispatcher for RejectingDispatcher {
        async fn dispatch(&self, _job: ExecuteJob, _headers: HeaderMap) -> Result<(), DispatchError> {
            Err(DispatchError::Rejected {
                status: 500,
                message: "executor down".to_string(),
            })
        }
    }

    fn local_state(upstream_base_url: Option<String>) -> AppState {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let executor = Arc::new(Executor::new(
            store.clone(),
            reqwest::Client::new(),
            upstream_base_url,
        ));
        AppState {
            store,
            dispatcher: Arc::new(LocalDispatcher::new(executor.clone())),
            executor,
            cleanup_on_read: false,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-api-key", "k")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn wait_for_terminal(app: &Router, job_id: &str) -> Value {
        for _ in 0..200 {
            let (status, body) = send(app, get(&format!("/jobs/status?jobId={}", job_id))).await;
            if status == StatusCode::OK && (body["status"] == "completed" || body["status"] == "failed") {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached a terminal state", job_id);
    }

    #[tokio::test]
    async fn test_health_reports_store() {
        let app = create_router(local_state(None));
        let (status, body) = send(&app, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn test_submit_and_poll_to_completion() {
        let upstream = MockServer::start_async().await;
        let mock = upstream
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/v5/ingredient-analysis/transaction")
                    .header("x-api-key", "k");
                then.status(200).json_body(json!({"results": [{"id": 1}]}));
            })
            .await;

        let app = create_router(local_state(Some(upstream.base_url())));

        let (status, body) = send(
            &app,
            post_json(
                "/jobs/start",
                json!({
                    "jobId": "abc",
                    "request": {
                        "endpoint": "/v5/ingredient-analysis/transaction",
                        "method": "POST",
                        "body": {"ingredients": ["flour"]}
                    }
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({"jobId": "abc"}));

        let record = wait_for_terminal(&app, "abc").await;
        assert_eq!(record["status"], "completed");
        assert_eq!(record["result"]["status"], 200);
        assert_eq!(record["result"]["body"], json!({"results": [{"id": 1}]}));
        assert!(record["completedAt"].is_string());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_failure_recorded() {
        let upstream = MockServer::start_async().await;
        upstream
            .mock_async(|when, then| {
                when.method("POST").path("/v5/ingredient-analysis/transaction");
                then.status(500)
                    .json_body(json!({"message": "invalid ingredient id"}));
            })
            .await;

        let app = create_router(local_state(Some(upstream.base_url())));
        let (status, _) = send(
            &app,
            post_json(
                "/jobs/start",
                json!({
                    "jobId": "bad",
                    "request": {"endpoint": "/v5/ingredient-analysis/transaction", "body": {}}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let record = wait_for_terminal(&app, "bad").await;
        assert_eq!(record["status"], "failed");
        assert_eq!(record["error"]["message"], "invalid ingredient id");
        assert_eq!(record["result"]["status"], 500);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_synchronous() {
        let mut state = local_state(None);
        state.dispatcher = Arc::new(RejectingDispatcher);
        let store = state.store.clone();
        let app = create_router(state);

        let (status, body) = send(
            &app,
            post_json("/jobs/start", json!({"jobId": "abc", "request": {"endpoint": "/x"}})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["message"].as_str().unwrap().contains("executor down"));
        assert_eq!(store.get("abc").await.unwrap().unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_start_rejects_bad_body() {
        let app = create_router(local_state(None));

        let (status, body) = send(&app, post_json("/jobs/start", json!({"request": {}}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());

        let (status, _) = send(
            &app,
            post_json("/jobs/start", json!({"request": {"endpoint": ""}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_not_found_and_missing_param() {
        let app = create_router(local_state(None));

        let (status, _) = send(&app, get("/jobs/status?jobId=nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, get("/jobs/status")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_cleanup_deletes_terminal_record() {
        let state = local_state(None);
        let store = state.store.clone();
        job_repository::merge_patch(store.as_ref(), "done", JobPatch::status(JobStatus::Completed))
            .await
            .unwrap();
        let app = create_router(state);

        let (status, body) = send(&app, get("/jobs/status?jobId=done&cleanup=true")).await;
        assert_eq!(status, StatusCode::OK);
        let record: JobRecord = serde_json::from_value(body).unwrap();
        assert_eq!(record.status, JobStatus::Completed);

        let (status, _) = send(&app, get("/jobs/status?jobId=done")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_execute_trigger_answers_immediately() {
        let state = local_state(None);
        let store = state.store.clone();
        let app = create_router(state);

        let (status, body) = send(
            &app,
            post_json("/jobs/execute", json!({"jobId": "abc", "request": {"endpoint": "/x"}})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"accepted": true, "jobId": "abc"}));

        // No upstream base URL: the job still ends up recorded as failed
        let record = wait_for_terminal(&app, "abc").await;
        assert_eq!(record["status"], "failed");
        assert!(store.get("abc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_delete_and_purge() {
        let state = local_state(None);
        let store = state.store.clone();
        job_repository::merge_patch(store.as_ref(), "live", JobPatch::status(JobStatus::Running))
            .await
            .unwrap();
        job_repository::merge_patch(store.as_ref(), "old", JobPatch::status(JobStatus::Failed))
            .await
            .unwrap();
        job_repository::merge_patch(store.as_ref(), "gone", JobPatch::status(JobStatus::Pending))
            .await
            .unwrap();
        let app = create_router(state);

        let (status, body) = send(&app, get("/jobs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["jobIds"], json!(["gone", "live", "old"]));

        let request = Request::builder()
            .method("DELETE")
            .uri("/jobs/gone")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let (status, body) = send(&app, post_json("/jobs/purge?olderThanSecs=0", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], json!(["old"]));

        assert_eq!(store.list_keys().await.unwrap(), vec!["live"]);
    }
}
