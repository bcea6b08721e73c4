//! Job DTOs for inter-service communication

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Method used when a submission does not name one
pub const DEFAULT_METHOD: &str = "POST";

/// Upstream call as submitted by a client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamCall {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,
}

impl UpstreamCall {
    /// Uppercased method, falling back to `POST`
    pub fn method_or_default(&self) -> String {
        self.method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_METHOD)
            .to_ascii_uppercase()
    }
}

/// Body of `POST /jobs/start`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub request: UpstreamCall,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

/// Answer to an accepted submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobResponse {
    pub job_id: String,
}

/// Body of `POST /jobs/execute`: the submission with its id resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteJob {
    pub job_id: String,
    pub request: UpstreamCall,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

impl ExecuteJob {
    pub fn from_start(job_id: String, start: StartJob) -> Self {
        Self {
            job_id,
            request: start.request,
            metadata: start.metadata,
        }
    }
}

/// Answer of the executor trigger; the upstream outcome lands in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteAccepted {
    pub accepted: bool,
    pub job_id: String,
}

/// Live job ids, `GET /jobs`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobIdList {
    pub job_ids: Vec<String>,
}

/// Ids removed by `POST /jobs/purge`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    pub deleted: Vec<String>,
}

/// Error body returned by every endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
