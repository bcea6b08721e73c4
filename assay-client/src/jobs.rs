//! Job-related API endpoints

use crate::AssayClient;
use crate::error::{ClientError, Result};
use assay_core::domain::job::JobRecord;
use assay_core::dto::job::{JobIdList, PurgeResponse, StartJob, StartJobResponse};
use reqwest::StatusCode;

impl AssayClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Submit a job to the launcher
    ///
    /// Only `200` and `202` count as accepted. If the launcher answers
    /// without a job ID, the ID carried in `req` is used.
    ///
    /// # Arguments
    /// * `req` - The submission
    /// * `api_key` - Upstream credential forwarded to the executor
    pub async fn start_job(&self, req: &StartJob, api_key: Option<&str>) -> Result<StartJobResponse> {
        let url = format!("{}/jobs/start", self.base_url);
        let response = Self::authorize(self.client.post(&url), api_key)
            .json(req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            return Err(ClientError::api_error(status.as_u16(), body));
        }

        serde_json::from_str::<StartJobResponse>(&body)
            .ok()
            .or_else(|| {
                req.job_id.clone().map(|job_id| StartJobResponse { job_id })
            })
            .ok_or_else(|| ClientError::ParseError("Launcher response carried no jobId".to_string()))
    }

    /// Get the current record of a job
    ///
    /// # Returns
    /// `None` while the job is not (yet) visible in the store
    pub async fn get_job_status(&self, job_id: &str) -> Result<Option<JobRecord>> {
        self.fetch_status(job_id, false).await
    }

    /// Get a job record and ask the server to delete it if it is terminal.
    ///
    /// A terminal record returned here cannot be read again.
    pub async fn take_job_status(&self, job_id: &str) -> Result<Option<JobRecord>> {
        self.fetch_status(job_id, true).await
    }

    async fn fetch_status(&self, job_id: &str, cleanup: bool) -> Result<Option<JobRecord>> {
        let url = format!("{}/jobs/status", self.base_url);
        let mut query = vec![("jobId", job_id.to_string())];
        if cleanup {
            query.push(("cleanup", "true".to_string()));
        }

        let response = self.client.get(&url).query(&query).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        self.handle_response(response).await.map(Some)
    }

    // =============================================================================
    // Maintenance
    // =============================================================================

    /// List the IDs of every stored job
    pub async fn list_jobs(&self) -> Result<Vec<String>> {
        let url = format!("{}/jobs", self.base_url);
        let response = self.client.get(&url).send().await?;

        let list: JobIdList = self.handle_response(response).await?;
        Ok(list.job_ids)
    }

    /// Delete a job record
    pub async fn delete_job(&self, job_id: &str) -> Result<()> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Delete terminal jobs that completed more than `older_than_secs` ago
    ///
    /// # Returns
    /// The IDs of the deleted jobs
    pub async fn purge_jobs(&self, older_than_secs: u32) -> Result<Vec<String>> {
        let url = format!("{}/jobs/purge", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("olderThanSecs", older_than_secs)])
            .send()
            .await?;

        let purged: PurgeResponse = self.handle_response(response).await?;
        Ok(purged.deleted)
    }
}
