//! File serving routes
//!
//! Serves results from the local blob store behind signed, expiring links.
//! With an S3 backend the download links point at the bucket instead and
//! this route answers 404.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the files router
pub fn router() -> Router<AppState> {
    Router::new().route("/*key", get(serve_file))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub expires: i64,
    pub signature: String,
}

/// Serve a file from the local store
async fn serve_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    query: Option<Query<DownloadQuery>>,
) -> Result<Response> {
    let store = state
        .local_store()
        .ok_or_else(|| AppError::NotFound(key.clone()))?;

    let Some(Query(query)) = query else {
        return Err(AppError::Forbidden("missing link signature".to_string()));
    };

    if !store.verify(&key, query.expires, &query.signature) {
        return Err(AppError::Forbidden("invalid or expired link".to_string()));
    }

    let path = store
        .object_path(&key)
        .map_err(|_| AppError::NotFound(key.clone()))?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(key));
        }
        Err(e) => return Err(AppError::Internal(format!("Failed to read {}: {}", key, e))),
    };

    let content_type = mime_guess::from_path(&key)
        .first_or_octet_stream()
        .to_string();

    // Get filename for Content-Disposition
    let filename = key.rsplit('/').next().unwrap_or(&key);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}
