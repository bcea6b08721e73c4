//! Blob store tier
//!
//! Records live as JSON objects in a remote object store reached over HTTP:
//! - `GET|PUT|DELETE {base}/{store}/{key}` for single records
//! - `GET {base}/{store}[?cursor=..]` for paged key listings
//!
//! Requests authenticate with a bearer token.

use assay_core::domain::job::JobRecord;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{RecordStore, StoreBackend, StoreConfig, StoreError};

/// Remote object store backend
#[derive(Debug, Clone)]
pub struct BlobStore {
    client: Client,
    base_url: Url,
    store_name: String,
    token: String,
}

impl BlobStore {
    /// Builds the client from configuration without touching the network
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let base_url = config
            .blob_url
            .as_deref()
            .ok_or_else(|| StoreError::MissingEnvironment("ASSAY_BLOB_URL".to_string()))?;
        let token = config
            .blob_token
            .clone()
            .ok_or_else(|| StoreError::MissingEnvironment("ASSAY_BLOB_TOKEN".to_string()))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::InvalidConfig(format!("blob url '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url,
            store_name: config.blob_store.clone(),
            token,
        })
    }

    /// Builds the client and probes the store with one listing request
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let store = Self::from_config(config)?;
        store.list_page(None).await?;
        Ok(store)
    }

    fn collection_url(&self) -> Result<Url, StoreError> {
        self.url_with(&[])
    }

    fn object_url(&self, key: &str) -> Result<Url, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }
        self.url_with(&[key])
    }

    fn url_with(&self, extra: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StoreError::InvalidConfig(format!("blob url '{}' cannot be a base", self.base_url))
            })?;
            segments.pop_if_empty().push(&self.store_name);
            for segment in extra {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    async fn list_page(&self, cursor: Option<&str>) -> Result<ListPage, StoreError> {
        let mut request = self
            .client
            .get(self.collection_url()?)
            .bearer_auth(&self.token);

        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = check(request.send().await?).await?;
        Ok(response.json::<ListPage>().await?)
    }
}

#[async_trait]
impl RecordStore for BlobStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Blob
    }

    async fn get(&self, key: &str) -> Result<Option<JobRecord>, StoreError> {
        let response = self
            .client
            .get(self.object_url(key)?)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check(response).await?;
        Ok(Some(response.json::<JobRecord>().await?))
    }

    async fn set(&self, key: &str, record: &JobRecord) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.object_url(key)?)
            .bearer_auth(&self.token)
            .json(record)
            .send()
            .await?;

        check(response).await?;
        debug!("Stored record {} in blob store", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.object_url(key)?)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        check(response).await?;
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.list_page(cursor.as_deref()).await?;
            keys.extend(page.blobs.into_iter().map(|b| b.key));

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(keys)
    }
}

/// Turns a non-2xx response into `StoreError::Backend`
async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(StoreError::Backend {
        status: status.as_u16(),
        message,
    })
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    blobs: Vec<BlobEntry>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlobEntry {
    key: String,
}
