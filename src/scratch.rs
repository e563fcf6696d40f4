//! Job scratch directories
//!
//! Every job gets its own directory under the scratch root. The directory and
//! everything in it is removed when the [`ScratchArea`] is released or
//! dropped, whichever comes first.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

/// Hands out per-job scratch directories under one root
#[derive(Debug, Clone)]
pub struct ScratchRoot {
    root: PathBuf,
}

impl ScratchRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create an empty, uniquely named directory for one job
    pub fn acquire(&self, job_id: &str) -> io::Result<ScratchArea> {
        std::fs::create_dir_all(&self.root)?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("job-{}-", job_id))
            .tempdir_in(&self.root)?;
        let path = dir.path().to_path_buf();

        tracing::debug!(job_id = %job_id, path = %path.display(), "Scratch area acquired");

        Ok(ScratchArea {
            dir: Some(dir),
            path,
            next: AtomicUsize::new(0),
        })
    }
}

/// A job-scoped local directory with guaranteed cleanup
#[derive(Debug)]
pub struct ScratchArea {
    dir: Option<TempDir>,
    path: PathBuf,
    next: AtomicUsize,
}

impl ScratchArea {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reserve a fresh path inside the area. The file is not created.
    pub fn new_path(&self, suffix: &str) -> PathBuf {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        self.path.join(format!("{:03}{}", n, suffix))
    }

    pub fn is_released(&self) -> bool {
        self.dir.is_none()
    }

    /// Remove the directory and its contents. Calling it again is a no-op.
    pub fn release(&mut self) -> io::Result<()> {
        match self.dir.take() {
            Some(dir) => {
                dir.close()?;
                tracing::debug!(path = %self.path.display(), "Scratch area released");
                Ok(())
            }
            None => Ok(()),
        }
    }
}
