//! PDF Toolbox Server Library
//!
//! Compresses, merges, splits and converts uploaded documents, staging every
//! input and result through a blob store and answering with a signed,
//! expiring download link. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `storage`: blob stores (S3-compatible and local filesystem)
//! - `scratch`: per-job local working directories
//! - `rasterizer`: Ghostscript subprocess wrapper
//! - `transform`: compress, merge, split and image-to-PDF
//! - `job`: request-scoped job coordination
//! - `routes`: HTTP endpoints

pub mod config;
pub mod error;
pub mod job;
pub mod rasterizer;
pub mod routes;
pub mod scratch;
pub mod state;
pub mod storage;
pub mod transform;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let max_body = state.config().server.max_body_bytes;

    Router::new()
        .merge(routes::health::router())
        .merge(routes::transform::router())
        .nest("/files", routes::files::router())
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
