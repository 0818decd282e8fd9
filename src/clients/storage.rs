//! Object storage client for creative images: upload by key, delete by key.

use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage request failed: {0}")]
    Request(String),

    #[error("Storage returned {status} for key {key}")]
    Status { status: u16, key: String },
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

pub struct StorageClient {
    client: Client,
    endpoint: String,
    bucket: String,
    access_token: String,
    public_base_url: String,
}

impl StorageClient {
    #[must_use]
    pub fn with_shared_client(client: Client, config: &StorageConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            access_token: config.access_token.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public URL an uploaded object is served from.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }

    pub async fn upload(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let response = self
            .client
            .put(format!("{}/{}/{key}", self.endpoint, self.bucket))
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::Status {
                status: response.status().as_u16(),
                key: key.to_string(),
            });
        }

        debug!(key, "Uploaded object");
        Ok(self.public_url(key))
    }

    /// Deleting a missing object succeeds; the cascade that calls this only
    /// cares that the key is gone.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(format!("{}/{}/{key}", self.endpoint, self.bucket))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::Status {
                status: response.status().as_u16(),
                key: key.to_string(),
            });
        }

        debug!(key, "Deleted object");
        Ok(())
    }
}
