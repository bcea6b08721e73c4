//! API Error Handling
//!
//! Unified error types and conversion for API responses.
//! Every error body is `{ "message": .. }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use assay_core::dto::job::ErrorBody;

use crate::service::launcher::LaunchError;
use crate::service::status::StatusError;
use crate::store::StoreError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// The executor could not be triggered
    BadGateway(String),
    StoreError(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => {
                tracing::error!("Dispatch error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            ApiError::StoreError(err) => {
                tracing::error!("Store error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Job store unavailable".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::StoreError(err)
    }
}

impl From<LaunchError> for ApiError {
    fn from(err: LaunchError) -> Self {
        match err {
            LaunchError::ValidationError(msg) => ApiError::BadRequest(msg),
            LaunchError::StoreError(err) => ApiError::StoreError(err),
            LaunchError::DispatchFailed { job_id, message } => {
                ApiError::BadGateway(format!("Job {}: {}", job_id, message))
            }
        }
    }
}

impl From<StatusError> for ApiError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::InvalidJobId(id) => ApiError::BadRequest(format!("Invalid jobId '{}'", id)),
            StatusError::NotFound(id) => ApiError::NotFound(format!("Job {} not found", id)),
            StatusError::StoreError(err) => ApiError::StoreError(err),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
