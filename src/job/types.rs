//! Job data model

use std::fmt;
use std::path::PathBuf;

use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::storage::SignedUrl;
use crate::transform::Operation;

/// Opaque job identifier, unique for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Where a job is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Received,
    Staged,
    Transformed,
    Published,
    Completed,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Received => "received",
            JobStage::Staged => "staged",
            JobStage::Transformed => "transformed",
            JobStage::Published => "published",
            JobStage::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// A file as it arrived in the request
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }
}

/// Everything the coordinator needs to run one job
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub operation: Operation,
    /// Upload order; this is the output order for merge and image conversion
    pub uploads: Vec<Upload>,
}

/// A staged input: remote key, type, and its copy in the scratch area
#[derive(Debug, Clone)]
pub struct InputBlob {
    pub key: String,
    pub content_type: String,
    pub file_name: String,
    pub local_path: Option<PathBuf>,
}

/// The single published result of a job
#[derive(Debug, Clone)]
pub struct OutputBlob {
    pub key: String,
    pub content_type: String,
    pub local_path: Option<PathBuf>,
}

/// One request's transformation instance
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub operation: Operation,
    pub inputs: Vec<InputBlob>,
    pub output: Option<OutputBlob>,
    pub stage: JobStage,
}

impl Job {
    pub fn new(operation: Operation) -> Self {
        Self {
            id: JobId::new(),
            operation,
            inputs: Vec::new(),
            output: None,
            stage: JobStage::Received,
        }
    }

    pub fn advance(&mut self, stage: JobStage) {
        tracing::debug!(job_id = %self.id, from = %self.stage, to = %stage, "Job stage change");
        self.stage = stage;
    }

    /// Staging key for the input at `index`. Single-input operations use
    /// the bare job id.
    pub fn staging_key(&self, index: usize, extension: &str) -> String {
        if self.operation.takes_single_input() {
            format!("uploads/{}.{}", self.id, extension)
        } else {
            format!("uploads/{}-{:03}.{}", self.id, index, extension)
        }
    }

    /// Key the result is published under
    pub fn result_key(&self) -> String {
        format!("processed/{}_{}.pdf", self.id, self.operation.result_suffix())
    }

    /// Remote keys written while staging inputs
    pub fn staged_keys(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|input| input.key.as_str())
    }
}

/// A completed job's answer to the caller
#[derive(Debug, Clone, Serialize)]
pub struct JobReceipt {
    #[serde(skip)]
    pub job_id: JobId,
    pub download_url: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

impl JobReceipt {
    pub fn new(job_id: JobId, signed: SignedUrl, skipped: Vec<String>) -> Self {
        Self {
            job_id,
            download_url: signed.url,
            expires_at: signed.expires_at,
            skipped,
        }
    }
}

/// A job that stopped before completing
#[derive(Debug)]
pub struct JobFailure {
    pub job_id: JobId,
    /// Last stage the job reached successfully
    pub stage: JobStage,
    pub error: AppError,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} failed after {}: {}", self.job_id, self.stage, self.error)
    }
}

impl std::error::Error for JobFailure {}

impl IntoResponse for JobFailure {
    fn into_response(self) -> Response {
        self.error.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::QualityTier;

    #[test]
    fn test_key_layout() {
        let job = Job::new(Operation::Compress {
            quality: QualityTier::Ebook,
        });
        let id = job.id.to_string();

        assert_eq!(job.staging_key(0, "pdf"), format!("uploads/{}.pdf", id));
        assert_eq!(job.result_key(), format!("processed/{}_compressed.pdf", id));
    }

    #[test]
    fn test_multi_input_keys_carry_the_index() {
        let job = Job::new(Operation::ImageToPdf);
        let id = job.id.to_string();

        assert_eq!(job.staging_key(0, "jpg"), format!("uploads/{}-000.jpg", id));
        assert_eq!(job.staging_key(12, "png"), format!("uploads/{}-012.png", id));
        assert_eq!(job.result_key(), format!("processed/{}_image.pdf", id));
    }

    #[test]
    fn test_job_ids_are_unique() {
        let ids: std::collections::HashSet<String> =
            (0..1000).map(|_| JobId::new().to_string()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_receipt_omits_empty_skipped_list() {
        let receipt = JobReceipt {
            job_id: JobId::new(),
            download_url: "http://x".into(),
            expires_at: chrono::Utc::now(),
            skipped: Vec::new(),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert!(json.get("skipped").is_none());
        assert_eq!(json["download_url"], "http://x");
    }
}
