//! Requested operations and the inputs they run on

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::rasterizer::QualityTier;

/// Extensions accepted by the PDF operations
pub const PDF_EXTENSIONS: &[&str] = &["pdf"];

/// Extensions accepted by image-to-PDF
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

/// One transformation, parsed once from the request and never mutated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    Compress { quality: QualityTier },
    Merge,
    /// 1-based, inclusive. Values outside the document are clamped.
    Split { start: i64, end: i64 },
    ImageToPdf,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Compress { .. } => "compress",
            Operation::Merge => "merge",
            Operation::Split { .. } => "split",
            Operation::ImageToPdf => "image",
        }
    }

    /// Suffix used in the published result key
    pub fn result_suffix(&self) -> &'static str {
        match self {
            Operation::Compress { .. } => "compressed",
            Operation::Merge => "merged",
            Operation::Split { .. } => "split",
            Operation::ImageToPdf => "image",
        }
    }

    pub fn takes_single_input(&self) -> bool {
        matches!(self, Operation::Compress { .. } | Operation::Split { .. })
    }

    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            Operation::ImageToPdf => IMAGE_EXTENSIONS,
            _ => PDF_EXTENSIONS,
        }
    }

    /// Extension check used for dispatch; file content is never sniffed
    pub fn accepts(&self, file_name: &str) -> bool {
        extension_of(file_name)
            .map(|ext| self.accepted_extensions().contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

/// Lowercased extension of a caller-supplied file name
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// An input that has already been fetched into the job's scratch area
#[derive(Debug, Clone)]
pub struct LocalInput {
    /// File name as uploaded; its extension decides how the input is read
    pub name: String,
    pub path: PathBuf,
}

impl LocalInput {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

/// What a successful operation leaves behind
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub path: PathBuf,
    /// Page count when the operation knows it without re-reading the output
    pub page_count: Option<u32>,
    /// Inputs ignored because their extension is not accepted
    pub skipped: Vec<String>,
}
