//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Longest accepted job identifier
pub const MAX_JOB_ID_LEN: usize = 128;

/// Job record
///
/// Structure shared between the launcher (creates), the executor (updates)
/// and the status endpoint (reads). The store key is exactly `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub request: RequestDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<UpstreamResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<JobMetrics>,
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// `completed` and `failed` admit no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream call descriptor stored with the job
///
/// Never carries the caller's credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

/// What the upstream API answered, present on success and on HTTP failures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamResult {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_bytes: Option<u64>,
}

/// Failure description, present only on `failed` records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl JobFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }
}

/// Timing of the upstream call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Partial request descriptor, merged field by field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestPatch {
    pub endpoint: Option<String>,
    pub method: Option<String>,
    pub metadata: Option<JsonValue>,
}

/// Partial job record applied by merge-patch
///
/// Top-level fields replace what is stored; `request` and `metrics`
/// are merged into the stored sub-objects instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub request: Option<RequestPatch>,
    pub result: Option<UpstreamResult>,
    pub error: Option<JobFailure>,
    pub metrics: Option<JobMetrics>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_request(mut self, request: RequestPatch) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_result(mut self, result: UpstreamResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: JobFailure) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.metrics = Some(JobMetrics {
            duration_ms: Some(duration_ms),
        });
        self
    }
}

impl JobRecord {
    /// Fresh `pending` record used when merge-patching an unknown id
    pub fn skeleton(job_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            started_at: now,
            updated_at: now,
            completed_at: None,
            request: RequestDescriptor::default(),
            result: None,
            error: None,
            metrics: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a merge-patch and returns the merged record.
    ///
    /// `updated_at` becomes `now`, clamped so it never moves backwards.
    /// `completed_at` is stamped the first time the status turns terminal.
    pub fn merged(mut self, patch: JobPatch, now: DateTime<Utc>) -> Self {
        if let Some(status) = patch.status {
            self.status = status;
        }

        if let Some(request) = patch.request {
            if let Some(endpoint) = request.endpoint {
                self.request.endpoint = endpoint;
            }
            if let Some(method) = request.method {
                self.request.method = method;
            }
            if let Some(metadata) = request.metadata {
                self.request.metadata = Some(metadata);
            }
        }

        if let Some(result) = patch.result {
            self.result = Some(result);
        }

        if let Some(error) = patch.error {
            self.error = Some(error);
        }

        if let Some(metrics) = patch.metrics {
            let current = self.metrics.get_or_insert_with(JobMetrics::default);
            if let Some(duration_ms) = metrics.duration_ms {
                current.duration_ms = Some(duration_ms);
            }
        }

        self.updated_at = now.max(self.updated_at);

        if self.status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(self.updated_at);
        }

        self
    }
}

/// Generates a fresh server-side job identifier
pub fn new_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Job ids double as store keys: `[A-Za-z0-9_-]{1,128}`
pub fn is_valid_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id.len() <= MAX_JOB_ID_LEN
        && job_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_skeleton_is_pending() {
        let record = JobRecord::skeleton("abc", t0());
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.started_at, t0());
        assert_eq!(record.updated_at, t0());
        assert!(record.completed_at.is_none());
    }

    #[test]
    fn test_merge_keeps_request_when_patching_metrics() {
        let record = JobRecord::skeleton("abc", t0()).merged(
            JobPatch::default().with_request(RequestPatch {
                endpoint: Some("/x".to_string()),
                ..RequestPatch::default()
            }),
            t0(),
        );
        let record = record.merged(JobPatch::default().with_duration_ms(5), t0());

        assert_eq!(record.request.endpoint, "/x");
        assert_eq!(record.metrics.unwrap().duration_ms, Some(5));
    }

    #[test]
    fn test_merge_request_fields_independently() {
        let record = JobRecord::skeleton("abc", t0()).merged(
            JobPatch::default().with_request(RequestPatch {
                endpoint: Some("/v5/ingredient-analysis/transaction".to_string()),
                method: Some("POST".to_string()),
                metadata: Some(json!({"source": "form"})),
            }),
            t0(),
        );
        let record = record.merged(
            JobPatch::default().with_request(RequestPatch {
                method: Some("PUT".to_string()),
                ..RequestPatch::default()
            }),
            t0(),
        );

        assert_eq!(record.request.endpoint, "/v5/ingredient-analysis/transaction");
        assert_eq!(record.request.method, "PUT");
        assert_eq!(record.request.metadata, Some(json!({"source": "form"})));
    }

    #[test]
    fn test_completed_at_set_once() {
        let running = JobRecord::skeleton("abc", t0())
            .merged(JobPatch::status(JobStatus::Running), t0() + Duration::seconds(1));
        assert!(running.completed_at.is_none());

        let done = running.merged(
            JobPatch::status(JobStatus::Completed),
            t0() + Duration::seconds(2),
        );
        assert_eq!(done.completed_at, Some(t0() + Duration::seconds(2)));

        let again = done.merged(JobPatch::default(), t0() + Duration::seconds(9));
        assert_eq!(again.completed_at, Some(t0() + Duration::seconds(2)));
        assert_eq!(again.updated_at, t0() + Duration::seconds(9));
    }

    #[test]
    fn test_updated_at_never_decreases() {
        let record = JobRecord::skeleton("abc", t0())
            .merged(JobPatch::status(JobStatus::Running), t0() + Duration::seconds(5));
        let record = record.merged(JobPatch::default(), t0() + Duration::seconds(1));

        assert_eq!(record.updated_at, t0() + Duration::seconds(5));
    }

    #[test]
    fn test_failed_record_keeps_result() {
        let record = JobRecord::skeleton("abc", t0()).merged(
            JobPatch::status(JobStatus::Failed)
                .with_result(UpstreamResult {
                    status: 500,
                    ..UpstreamResult::default()
                })
                .with_error(JobFailure::new("invalid ingredient id")),
            t0(),
        );

        assert_eq!(record.result.as_ref().unwrap().status, 500);
        assert_eq!(record.error.as_ref().unwrap().message, "invalid ingredient id");
        assert_eq!(record.completed_at, Some(t0()));
    }

    #[test]
    fn test_record_wire_format() {
        let record = JobRecord::skeleton("abc", t0()).merged(
            JobPatch::status(JobStatus::Completed).with_duration_ms(42),
            t0(),
        );
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["jobId"], "abc");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["metrics"]["durationMs"], 42);
        assert!(value.get("completedAt").is_some());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_job_id_validation() {
        assert!(is_valid_job_id("abc"));
        assert!(is_valid_job_id(&new_job_id()));
        assert!(is_valid_job_id("job_1-A"));
        assert!(!is_valid_job_id(""));
        assert!(!is_valid_job_id("../etc/passwd"));
        assert!(!is_valid_job_id("a b"));
        assert!(!is_valid_job_id(&"x".repeat(MAX_JOB_ID_LEN + 1)));
    }
}
