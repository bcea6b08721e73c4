//! Assay HTTP Client
//!
//! A type-safe HTTP client for the Assay orchestrator API, plus the
//! polling loop that turns "submit, then poll" into a single call.
//!
//! # Example
//!
//! ```no_run
//! use assay_client::{AssayClient, ValidationJobOptions, run_validation_job};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = AssayClient::new("http://localhost:8080");
//!
//!     let options = ValidationJobOptions::new(
//!         "/v5/ingredient-analysis/transaction",
//!         json!({ "ingredients": ["flour"] }),
//!     )
//!     .with_api_key("secret");
//!
//!     let record = run_validation_job(&client, options).await?;
//!     println!("Job {} finished as {}", record.job_id, record.status);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
pub mod poller;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use poller::{JobApi, PollError, ValidationJobOptions, run_validation_job};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// HTTP client for the Assay orchestrator API
///
/// Methods are organized into:
/// - Job lifecycle (start, status)
/// - Maintenance (list, delete, purge)
#[derive(Debug, Clone)]
pub struct AssayClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl AssayClient {
    /// Create a new orchestrator client
    ///
    /// # Example
    /// ```
    /// use assay_client::AssayClient;
    ///
    /// let client = AssayClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attach the upstream credential in both forms the API accepts
    fn authorize(request: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
        match api_key {
            Some(key) => request
                .header("x-api-key", key)
                .bearer_auth(key),
            None => request,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}
