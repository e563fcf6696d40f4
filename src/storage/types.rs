//! Storage types

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to write {key}: {detail}")]
    Write { key: String, detail: String },

    #[error("Failed to read {key}: {detail}")]
    Read { key: String, detail: String },

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign URL for {key}: {detail}")]
    Signing { key: String, detail: String },
}

impl StorageError {
    pub(crate) fn write(key: &str, detail: impl ToString) -> Self {
        StorageError::Write {
            key: key.to_string(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn read(key: &str, detail: impl ToString) -> Self {
        StorageError::Read {
            key: key.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// A time-bounded, credential-free retrieval link for a stored object
#[derive(Debug, Clone, Serialize)]
pub struct SignedUrl {
    pub key: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl SignedUrl {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Remote object store used to stage inputs and publish results.
///
/// Keys are always chosen by the caller. Implementations must be safe to share
/// between concurrent jobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Upload bytes under `key`
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    /// Upload a local file under `key`
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<(), StorageError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::write(key, format!("cannot read {}: {}", path.display(), e)))?;
        self.put(key, data, content_type).await
    }

    /// Download `key` into `path`, replacing anything already there
    async fn fetch_to_local(&self, key: &str, path: &Path) -> Result<(), StorageError>;

    /// Retrieval URL valid for `ttl`. Does not check that `key` exists.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl, StorageError>;

    /// Best-effort removal; failures are logged, never returned
    async fn delete(&self, key: &str);
}

/// Reject keys that could escape a bucket prefix or a local root
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");

    if bad {
        Err(StorageError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("uploads/abc-000.pdf").is_ok());
        assert!(validate_key("processed/abc_merged.pdf").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("uploads/../../etc/passwd").is_err());
        assert!(validate_key("uploads//double").is_err());
        assert!(validate_key("uploads\\win").is_err());
    }

    #[test]
    fn test_signed_url_expiry() {
        let url = SignedUrl {
            key: "k".into(),
            url: "http://x/k".into(),
            expires_at: Utc::now() - chrono::Duration::seconds(1),
        };
        assert!(url.is_expired());
    }
}
