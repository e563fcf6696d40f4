//! Job coordinator
//!
//! Drives one request through Received → Staged → Transformed → Published →
//! Completed. Whatever happens in between, the scratch area is released and
//! the staging objects are deleted before the result is handed back.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;
use crate::scratch::{ScratchArea, ScratchRoot};
use crate::storage::BlobStore;
use crate::transform::{extension_of, LocalInput, TransformEngine};

use super::types::{
    InputBlob, Job, JobFailure, JobReceipt, JobRequest, JobStage, OutputBlob, Upload,
};

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Runs jobs end to end. Cheap to share; holds no per-job state.
#[derive(Clone)]
pub struct JobCoordinator {
    store: Arc<dyn BlobStore>,
    scratch: ScratchRoot,
    engine: TransformEngine,
    url_ttl: Duration,
}

impl JobCoordinator {
    pub fn new(
        store: Arc<dyn BlobStore>,
        scratch: ScratchRoot,
        engine: TransformEngine,
        url_ttl: Duration,
    ) -> Self {
        Self {
            store,
            scratch,
            engine,
            url_ttl,
        }
    }

    /// Run one job to completion or failure
    pub async fn run(&self, request: JobRequest) -> Result<JobReceipt, JobFailure> {
        let mut job = Job::new(request.operation);

        tracing::info!(
            job_id = %job.id,
            operation = job.operation.name(),
            files = request.uploads.len(),
            backend = self.store.backend(),
            "Job received"
        );

        if let Err(error) = validate(&request) {
            return Err(self.failed(&job, error));
        }

        let mut scratch = match self.scratch.acquire(&job.id.to_string()) {
            Ok(scratch) => scratch,
            Err(e) => {
                let error = AppError::Internal(format!("cannot create scratch area: {}", e));
                return Err(self.failed(&job, error));
            }
        };

        let outcome = self.execute(&mut job, &scratch, request.uploads).await;
        self.release(&mut job, &mut scratch, outcome.is_err()).await;

        match outcome {
            Ok(receipt) => {
                job.advance(JobStage::Completed);
                tracing::info!(job_id = %job.id, operation = job.operation.name(), "Job completed");
                Ok(receipt)
            }
            Err(error) => Err(self.failed(&job, error)),
        }
    }

    async fn execute(
        &self,
        job: &mut Job,
        scratch: &ScratchArea,
        uploads: Vec<Upload>,
    ) -> Result<JobReceipt, AppError> {
        let inputs = self.stage_inputs(job, scratch, uploads).await?;
        job.advance(JobStage::Staged);

        let output = self
            .engine
            .run(job.operation, inputs, scratch.new_path(".pdf"))
            .await?;
        ensure_written(&output.path).await?;
        job.advance(JobStage::Transformed);
        tracing::info!(
            job_id = %job.id,
            pages = ?output.page_count,
            skipped = output.skipped.len(),
            "Job transformed"
        );

        let key = job.result_key();
        self.store.put_file(&key, &output.path, PDF_CONTENT_TYPE).await?;
        job.output = Some(OutputBlob {
            key: key.clone(),
            content_type: PDF_CONTENT_TYPE.to_string(),
            local_path: Some(output.path),
        });

        let signed = self.store.signed_url(&key, self.url_ttl).await?;
        job.advance(JobStage::Published);

        Ok(JobReceipt::new(job.id, signed, output.skipped))
    }

    /// Put every upload into the store, then fetch it back into scratch
    async fn stage_inputs(
        &self,
        job: &mut Job,
        scratch: &ScratchArea,
        uploads: Vec<Upload>,
    ) -> Result<Vec<LocalInput>, AppError> {
        let mut locals = Vec::with_capacity(uploads.len());

        for (index, upload) in uploads.into_iter().enumerate() {
            let extension = safe_extension(&upload.file_name);
            let key = job.staging_key(index, &extension);
            let content_type = mime_guess::from_path(&upload.file_name)
                .first_or_octet_stream()
                .to_string();
            let size = upload.data.len();

            self.store.put(&key, upload.data, &content_type).await?;
            job.inputs.push(InputBlob {
                key: key.clone(),
                content_type,
                file_name: upload.file_name.clone(),
                local_path: None,
            });

            let local = scratch.new_path(&format!(".{}", extension));
            self.store.fetch_to_local(&key, &local).await?;
            if let Some(input) = job.inputs.last_mut() {
                input.local_path = Some(local.clone());
            }

            tracing::debug!(job_id = %job.id, key = %key, bytes = size, "Input staged");
            locals.push(LocalInput::new(upload.file_name, local));
        }

        Ok(locals)
    }

    /// Unconditional cleanup. Never returns an error so it cannot mask one.
    async fn release(&self, job: &mut Job, scratch: &mut ScratchArea, failed: bool) {
        if let Err(e) = scratch.release() {
            tracing::warn!(job_id = %job.id, path = %scratch.path().display(), "Failed to release scratch area: {}", e);
        }
        for input in &mut job.inputs {
            input.local_path = None;
        }
        if let Some(output) = job.output.as_mut() {
            output.local_path = None;
        }

        for key in job.staged_keys() {
            self.store.delete(key).await;
        }

        // A result nobody will get a link to is just a leak
        if failed {
            if let Some(output) = &job.output {
                self.store.delete(&output.key).await;
            }
        }
    }

    fn failed(&self, job: &Job, error: AppError) -> JobFailure {
        if error.status_code().is_server_error() {
            tracing::error!(job_id = %job.id, stage = %job.stage, operation = job.operation.name(), "Job failed: {}", error);
        } else {
            tracing::info!(job_id = %job.id, stage = %job.stage, operation = job.operation.name(), "Job rejected: {}", error);
        }

        JobFailure {
            job_id: job.id,
            stage: job.stage,
            error,
        }
    }
}

/// Operation-specific request checks, run before anything touches storage
pub fn validate(request: &JobRequest) -> Result<(), AppError> {
    let operation = request.operation;

    if request.uploads.is_empty() {
        return Err(AppError::Validation("No files were uploaded".to_string()));
    }

    if operation.takes_single_input() {
        if request.uploads.len() != 1 {
            return Err(AppError::Validation(format!(
                "{} takes exactly one file, got {}",
                operation.name(),
                request.uploads.len()
            )));
        }
        let upload = &request.uploads[0];
        if !operation.accepts(&upload.file_name) {
            return Err(AppError::Validation(format!(
                "Invalid file '{}': expected a PDF",
                upload.file_name
            )));
        }
    }

    Ok(())
}

/// Extension used in staging keys and scratch names; never taken verbatim
fn safe_extension(file_name: &str) -> String {
    extension_of(file_name)
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

async fn ensure_written(path: &Path) -> Result<(), AppError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(AppError::Internal(format!("{} is empty", path.display()))),
        Err(e) => Err(AppError::Internal(format!("{} missing: {}", path.display(), e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::QualityTier;
    use crate::transform::Operation;

    fn request(operation: Operation, names: &[&str]) -> JobRequest {
        JobRequest {
            operation,
            uploads: names.iter().map(|n| Upload::new(*n, b"data".to_vec())).collect(),
        }
    }

    #[test]
    fn test_validate_requires_files() {
        let err = validate(&request(Operation::Merge, &[])).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_validate_single_input_operations() {
        let compress = Operation::Compress {
            quality: QualityTier::Ebook,
        };
        assert!(validate(&request(compress, &["a.pdf"])).is_ok());
        assert!(validate(&request(compress, &["a.PDF"])).is_ok());
        assert!(validate(&request(compress, &["a.docx"])).is_err());
        assert!(validate(&request(compress, &["a.pdf", "b.pdf"])).is_err());

        let split = Operation::Split { start: 1, end: 2 };
        assert!(validate(&request(split, &["scan.png"])).is_err());
    }

    #[test]
    fn test_validate_leaves_filtering_to_multi_input_operations() {
        assert!(validate(&request(Operation::Merge, &["a.pdf", "notes.txt"])).is_ok());
        assert!(validate(&request(Operation::ImageToPdf, &["notes.txt"])).is_ok());
    }

    #[test]
    fn test_safe_extension() {
        assert_eq!(safe_extension("Report.PDF"), "pdf");
        assert_eq!(safe_extension("photo.jpeg"), "jpeg");
        assert_eq!(safe_extension("noext"), "bin");
        assert_eq!(safe_extension("weird.p d$f"), "bin");
        assert_eq!(safe_extension("long.abcdefghijk"), "bin");
    }
}
