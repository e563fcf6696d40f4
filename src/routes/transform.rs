//! Transformation routes
//!
//! Endpoints:
//! - POST /compress - field `file` (PDF), optional `quality`
//! - POST /merge - field `files` (PDFs, order preserved)
//! - POST /split - field `file` (PDF), `start` and `end` (default 1)
//! - POST /image - field `file` (images, order preserved)

use std::collections::HashMap;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::error::{AppError, Result};
use crate::job::{JobReceipt, JobRequest, Upload};
use crate::rasterizer::QualityTier;
use crate::state::AppState;
use crate::transform::Operation;

/// Create the transformation router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/compress", post(compress))
        .route("/merge", post(merge))
        .route("/split", post(split))
        .route("/image", post(image_to_pdf))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /compress
async fn compress(State(state): State<AppState>, multipart: Multipart) -> Result<Json<JobReceipt>> {
    let form = read_form(multipart, "file", state.config().server.max_body_bytes).await?;

    let quality = match form.text("quality") {
        Some(raw) => raw.parse::<QualityTier>().map_err(AppError::Validation)?,
        None => state.config().rasterizer.default_quality,
    };

    submit(&state, Operation::Compress { quality }, form.uploads).await
}

/// POST /merge
async fn merge(State(state): State<AppState>, multipart: Multipart) -> Result<Json<JobReceipt>> {
    let form = read_form(multipart, "files", state.config().server.max_body_bytes).await?;
    submit(&state, Operation::Merge, form.uploads).await
}

/// POST /split
async fn split(State(state): State<AppState>, multipart: Multipart) -> Result<Json<JobReceipt>> {
    let form = read_form(multipart, "file", state.config().server.max_body_bytes).await?;

    let start = form.page_number("start")?;
    let end = form.page_number("end")?;

    submit(&state, Operation::Split { start, end }, form.uploads).await
}

/// POST /image
async fn image_to_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<JobReceipt>> {
    let form = read_form(multipart, "file", state.config().server.max_body_bytes).await?;
    submit(&state, Operation::ImageToPdf, form.uploads).await
}

/// Run the job on its own task. If the client goes away the handler future
/// is dropped, but the job still finishes and cleans up.
async fn submit(
    state: &AppState,
    operation: Operation,
    uploads: Vec<Upload>,
) -> Result<Json<JobReceipt>> {
    let coordinator = state.coordinator().clone();
    let request = JobRequest { operation, uploads };

    tokio::spawn(async move { coordinator.run(request).await })
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
        .map(Json)
        .map_err(|failure| failure.error)
}

// ============================================================================
// Form parsing
// ============================================================================

/// A parsed multipart body: files in arrival order plus text fields
#[derive(Debug, Default)]
struct Form {
    uploads: Vec<Upload>,
    fields: HashMap<String, String>,
}

impl Form {
    /// A non-blank text field
    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Integer page field, defaulting to 1 when absent
    fn page_number(&self, name: &str) -> Result<i64> {
        match self.text(name) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| AppError::Validation(format!("'{}' must be an integer, got '{}'", name, raw))),
            None => Ok(1),
        }
    }
}

async fn read_form(mut multipart: Multipart, file_field: &str, limit: usize) -> Result<Form> {
    let mut form = Form::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == file_field {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

            // Browsers send an empty part for an untouched file input
            if file_name.is_empty() && data.is_empty() {
                continue;
            }
            form.uploads.push(Upload::new(file_name, data.to_vec()));
        } else {
            let value = field.text().await.map_err(|e| multipart_error(e, limit))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(limit)
    } else {
        err.into()
    }
}
