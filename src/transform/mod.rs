//! Document transformations
//!
//! Each operation reads inputs that already sit in a job's scratch area and
//! writes exactly one output file. Outputs only appear at their final path
//! once the operation has succeeded.

mod error;
mod images;
mod operation;
mod pages;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub use error::{Result, TransformError, TransformErrorKind};
pub use images::{flatten_to_rgb, images_to_pdf};
pub use operation::{
    extension_of, LocalInput, Operation, TransformOutput, IMAGE_EXTENSIONS, PDF_EXTENSIONS,
};
pub use pages::{clamp_range, merge, split, PageAssembler};

use crate::rasterizer::{QualityTier, Rasterizer};

/// Dispatches operations to their implementations
#[derive(Debug, Clone)]
pub struct TransformEngine {
    rasterizer: Rasterizer,
}

impl TransformEngine {
    pub fn new(rasterizer: Rasterizer) -> Self {
        Self { rasterizer }
    }

    /// Run `operation` over `inputs` (in order) and write the result to `output`
    pub async fn run(
        &self,
        operation: Operation,
        inputs: Vec<LocalInput>,
        output: PathBuf,
    ) -> Result<TransformOutput> {
        match operation {
            Operation::Compress { quality } => {
                let input = single_input(&inputs, operation)?;
                self.compress(input, &output, quality).await
            }
            Operation::Merge => blocking(move || merge(&inputs, &output)).await,
            Operation::Split { start, end } => {
                let input = single_input(&inputs, operation)?.clone();
                blocking(move || split(&input, &output, start, end)).await
            }
            Operation::ImageToPdf => blocking(move || images_to_pdf(&inputs, &output)).await,
        }
    }

    /// Rewrite one PDF through the rasterizer. A larger result is kept as-is.
    pub async fn compress(
        &self,
        input: &LocalInput,
        output: &Path,
        quality: QualityTier,
    ) -> Result<TransformOutput> {
        self.rasterizer.compress(&input.path, output, quality).await?;

        Ok(TransformOutput {
            path: output.to_path_buf(),
            page_count: None,
            skipped: Vec::new(),
        })
    }
}

fn single_input(inputs: &[LocalInput], operation: Operation) -> Result<&LocalInput> {
    match inputs {
        [input] if operation.accepts(&input.name) => Ok(input),
        _ => Err(TransformError::NoValidInputs {
            operation: operation.name(),
        }),
    }
}

/// Run CPU-bound document work on the blocking pool
async fn blocking<F>(work: F) -> Result<TransformOutput>
where
    F: FnOnce() -> Result<TransformOutput> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| TransformError::Render(format!("Task join error: {}", e)))?
}

/// Write `bytes` next to `output` and move them into place in one step
pub(crate) fn commit_output(output: &Path, bytes: &[u8]) -> Result<()> {
    let mut partial = OsString::from(output.as_os_str());
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let written = std::fs::write(&partial, bytes).and_then(|_| std::fs::rename(&partial, output));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&partial);
        return Err(e.into());
    }
    Ok(())
}
