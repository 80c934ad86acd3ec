//! S3-compatible object store client (spec §2, §6 `TIGRIS_*` configuration).
//! Grounded in `original_source/apps/jobs/utils/storage.py`'s
//! `download_from_tigris`/`upload_to_tigris`: path-style addressing against
//! a custom endpoint, whole-object reads and writes (no multipart).

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store request failed: {0}")]
    Request(String),

    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob download/upload against a single bucket-namespaced S3-compatible
/// endpoint. Session-level state (the underlying client) is safe to share
/// across concurrent jobs (spec §5, "Shared resources").
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download(
        &self,
        bucket: &str,
        object_key: &str,
        destination: &Path,
    ) -> Result<(), ObjectStoreError>;

    async fn upload(
        &self,
        bucket: &str,
        object_key: &str,
        source: &Path,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;
}

/// Production implementation against Tigris (or any S3-compatible store)
/// via `aws-sdk-s3`, configured with path-style addressing the way
/// `storage.py`'s `botocore.config.Config(s3={"addressing_style": "path"})`
/// does.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(endpoint: &str, region: &str, access_key_id: &str, secret_access_key: &str) -> Self {
        let credentials = Credentials::new(access_key_id, secret_access_key, None, None, "clipqueue");
        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(endpoint)
            .region(aws_sdk_s3::config::Region::new(region.to_string()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .build();
        Self {
            client: Client::from_conf(config),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download(
        &self,
        bucket: &str,
        object_key: &str,
        destination: &Path,
    ) -> Result<(), ObjectStoreError> {
        tracing::debug!(bucket, object_key, destination = %destination.display(), "downloading object");

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(object_key)
            .send()
            .await
            .map_err(|e| {
                let error = e.to_string();
                tracing::warn!(bucket, object_key, %error, "object store download request failed");
                ObjectStoreError::Request(error)
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| {
                let error = e.to_string();
                tracing::warn!(bucket, object_key, %error, "failed to read object store response body");
                ObjectStoreError::Request(error)
            })?
            .into_bytes();

        tokio::fs::write(destination, &data).await?;
        tracing::debug!(bucket, object_key, bytes = data.len(), "download complete");
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        object_key: &str,
        source: &Path,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        tracing::debug!(bucket, object_key, content_type, "uploading object");

        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(object_key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                let error = e.to_string();
                tracing::warn!(bucket, object_key, %error, "object store upload request failed");
                ObjectStoreError::Request(error)
            })?;

        tracing::debug!(bucket, object_key, "upload complete");
        Ok(())
    }
}
