//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::job::JobCoordinator;
use crate::rasterizer::Rasterizer;
use crate::scratch::ScratchRoot;
use crate::storage::{BlobStore, LocalBlobStore, S3Client};
use crate::transform::TransformEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pub config: Config,
    pub coordinator: JobCoordinator,
    pub local_store: Option<Arc<LocalBlobStore>>,
}

impl AppState {
    /// Wire storage, scratch space and the transform engine from configuration
    pub async fn from_config(config: Config) -> Self {
        let (store, local_store): (Arc<dyn BlobStore>, Option<Arc<LocalBlobStore>>) =
            if config.storage.provider.is_local() {
                let local = Arc::new(LocalBlobStore::new(
                    &config.storage.local_root,
                    &config.storage.public_base_url,
                    &config.storage.signing_secret,
                ));
                tracing::info!(root = %config.storage.local_root.display(), "Using local blob store");
                (local.clone() as Arc<dyn BlobStore>, Some(local))
            } else {
                tracing::info!("S3 endpoint: {}", config.storage.endpoint);
                tracing::info!("S3 bucket: {}", config.storage.bucket);
                (
                    Arc::new(S3Client::new(&config.storage).await) as Arc<dyn BlobStore>,
                    None,
                )
            };

        let coordinator = JobCoordinator::new(
            store,
            ScratchRoot::new(&config.jobs.scratch_dir),
            TransformEngine::new(Rasterizer::from_config(&config.rasterizer)),
            config.jobs.signed_url_ttl(),
        );

        Self::new(config, coordinator, local_store)
    }

    pub fn new(
        config: Config,
        coordinator: JobCoordinator,
        local_store: Option<Arc<LocalBlobStore>>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                coordinator,
                local_store,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the job coordinator
    pub fn coordinator(&self) -> &JobCoordinator {
        &self.inner.coordinator
    }

    /// The local blob store, when it is the configured backend
    pub fn local_store(&self) -> Option<&LocalBlobStore> {
        self.inner.local_store.as_deref()
    }
}
