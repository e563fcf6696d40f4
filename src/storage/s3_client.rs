//! S3-compatible storage client
//!
//! Wraps the AWS SDK for S3-compatible storage access.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    presigning::PresigningConfig,
    primitives::ByteStream,
    Client,
};
use chrono::Utc;

use crate::config::StorageConfig;

use super::types::{validate_key, BlobStore, SignedUrl, StorageError};

/// S3-compatible storage client
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
}

impl S3Client {
    /// Create a new S3 client from configuration
    pub async fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "pdf-toolbox",
        );

        let region = config
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(region))
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO and other S3-compatible services
            .build();

        let client = Client::from_conf(s3_config);

        // Test connection by checking if bucket exists
        let bucket = config.bucket.clone();
        match client.head_bucket().bucket(&bucket).send().await {
            Ok(_) => {
                tracing::info!("Connected to S3 bucket: {}", bucket);
            }
            Err(e) => {
                tracing::warn!(
                    "Could not verify bucket {}: {}. Will attempt operations anyway.",
                    bucket,
                    e
                );
            }
        }

        Self { client, bucket }
    }

    async fn put_body(&self, key: &str, body: ByteStream, content_type: &str) -> Result<(), StorageError> {
        validate_key(key)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::write(key, e))?;

        tracing::debug!(bucket = %self.bucket, key = %key, "Object stored");
        Ok(())
    }
}

#[async_trait]
impl BlobStore for S3Client {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.put_body(key, ByteStream::from(data), content_type).await
    }

    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<(), StorageError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::write(key, format!("cannot stream {}: {}", path.display(), e)))?;
        self.put_body(key, body, content_type).await
    }

    async fn fetch_to_local(&self, key: &str, path: &Path) -> Result<(), StorageError> {
        validate_key(key)?;

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("404") || e.to_string().contains("NoSuchKey") {
                    StorageError::ObjectNotFound(key.to_string())
                } else {
                    StorageError::read(key, e)
                }
            })?;

        let mut body = response.body.into_async_read();
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| StorageError::read(key, format!("cannot create {}: {}", path.display(), e)))?;

        let copied = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| StorageError::read(key, e))?;

        tracing::debug!(key = %key, bytes = copied, "Object fetched");
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl, StorageError> {
        validate_key(key)?;

        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| StorageError::Signing {
            key: key.to_string(),
            detail: e.to_string(),
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Signing {
                key: key.to_string(),
                detail: e.to_string(),
            })?;

        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));

        Ok(SignedUrl {
            key: key.to_string(),
            url: request.uri().to_string(),
            expires_at,
        })
    }

    async fn delete(&self, key: &str) {
        let result = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        if let Err(e) = result {
            tracing::warn!(bucket = %self.bucket, key = %key, "Failed to delete object: {}", e);
        }
    }
}
