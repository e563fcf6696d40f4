//! Local filesystem blob store
//!
//! Objects live under a root directory, one file per key. Download links
//! point at the `/files` route and carry an expiry plus a SHA-256 signature
//! over a server secret, so they can be handed out like presigned S3 URLs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::types::{validate_key, BlobStore, SignedUrl, StorageError};

/// Filesystem-backed [`BlobStore`]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
    secret: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, secret: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
        }
    }

    /// Filesystem location of `key`
    pub fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"\n");
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check a download link's signature and expiry
    pub fn verify(&self, key: &str, expires: i64, signature: &str) -> bool {
        if Utc::now().timestamp() >= expires {
            return false;
        }
        let expected = self.signature(key, expires);
        // Compare every byte so timing does not reveal the prefix length
        expected.len() == signature.len()
            && expected
                .bytes()
                .zip(signature.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }

    fn sign(&self, key: &str, expires_at: DateTime<Utc>) -> String {
        let expires = expires_at.timestamp();
        let encoded_key = key
            .split('/')
            .map(|part| urlencoding::encode(part).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        format!(
            "{}/files/{}?expires={}&signature={}",
            self.public_base_url,
            encoded_key,
            expires,
            self.signature(key, expires)
        )
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::write(key, e))?;
        }

        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StorageError::write(key, e))?;

        tracing::debug!(key = %key, bytes = data.len(), "Object stored locally");
        Ok(())
    }

    async fn put_file(&self, key: &str, path: &Path, _content_type: &str) -> Result<(), StorageError> {
        let target = self.object_path(key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::write(key, e))?;
        }

        let copied = tokio::fs::copy(path, &target)
            .await
            .map_err(|e| StorageError::write(key, format!("cannot copy {}: {}", path.display(), e)))?;

        tracing::debug!(key = %key, bytes = copied, "Object stored locally");
        Ok(())
    }

    async fn fetch_to_local(&self, key: &str, path: &Path) -> Result<(), StorageError> {
        let source = self.object_path(key)?;
        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            return Err(StorageError::ObjectNotFound(key.to_string()));
        }

        tokio::fs::copy(&source, path)
            .await
            .map_err(|e| StorageError::read(key, e))?;
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl, StorageError> {
        validate_key(key)?;

        let ttl = chrono::Duration::from_std(ttl).map_err(|e| StorageError::Signing {
            key: key.to_string(),
            detail: e.to_string(),
        })?;
        let expires_at = Utc::now() + ttl;

        Ok(SignedUrl {
            key: key.to_string(),
            url: self.sign(key, expires_at),
            expires_at,
        })
    }

    async fn delete(&self, key: &str) {
        let path = match self.object_path(key) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(key = %key, "Refusing to delete: {}", e);
                return;
            }
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(key = %key, "Failed to delete object: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> LocalBlobStore {
        LocalBlobStore::new(dir.path(), "http://localhost:8080/", "test-secret")
    }

    #[tokio::test]
    async fn test_put_fetch_delete() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let local = dir.path().join("fetched.bin");

        store.put("uploads/job-000.pdf", b"%PDF-1.4".to_vec(), "application/pdf").await.unwrap();
        store.fetch_to_local("uploads/job-000.pdf", &local).await.unwrap();
        assert_eq!(std::fs::read(&local).unwrap(), b"%PDF-1.4");

        store.delete("uploads/job-000.pdf").await;
        let err = store.fetch_to_local("uploads/job-000.pdf", &local).await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_silent() {
        let dir = TempDir::new().unwrap();
        store(&dir).delete("uploads/never-written.pdf").await;
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let err = store(&dir)
            .put("../outside.pdf", Vec::new(), "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_signed_url_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let signed = store
            .signed_url("processed/abc_split.pdf", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(signed.url.starts_with("http://localhost:8080/files/processed/abc_split.pdf?expires="));
        assert!(!signed.is_expired());

        let expires = signed.expires_at.timestamp();
        let signature = signed.url.rsplit("signature=").next().unwrap();
        assert!(store.verify("processed/abc_split.pdf", expires, signature));
        assert!(!store.verify("processed/other.pdf", expires, signature));
        assert!(!store.verify("processed/abc_split.pdf", expires + 1, signature));
    }

    #[test]
    fn test_expired_links_fail_verification() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let past = Utc::now().timestamp() - 10;
        let signature = store.signature("processed/a.pdf", past);
        assert!(!store.verify("processed/a.pdf", past, &signature));
    }
}
