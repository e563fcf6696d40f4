//! Transform error types

use thiserror::Error;

use crate::rasterizer::RasterizerError;

/// Flat classification of a [`TransformError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformErrorKind {
    NoValidInputs,
    InvalidRange,
    UnreadableInput,
    Rasterizer,
    Render,
    Io,
}

#[derive(Debug, Error)]
pub enum TransformError {
    /// Nothing usable was left after skipping unsupported entries
    #[error("No valid {operation} inputs were provided")]
    NoValidInputs { operation: &'static str },

    /// Requested page range is empty once clamped to the document
    #[error("Invalid page range {start}-{end} for a document with {page_count} pages")]
    InvalidRange {
        start: i64,
        end: i64,
        page_count: u32,
    },

    /// An input with an accepted extension could not be decoded
    #[error("Could not read {name}: {detail}")]
    UnreadableInput { name: String, detail: String },

    #[error(transparent)]
    Rasterizer(#[from] RasterizerError),

    /// Building the output document failed
    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransformError {
    pub fn kind(&self) -> TransformErrorKind {
        match self {
            TransformError::NoValidInputs { .. } => TransformErrorKind::NoValidInputs,
            TransformError::InvalidRange { .. } => TransformErrorKind::InvalidRange,
            TransformError::UnreadableInput { .. } => TransformErrorKind::UnreadableInput,
            TransformError::Rasterizer(_) => TransformErrorKind::Rasterizer,
            TransformError::Render(_) => TransformErrorKind::Render,
            TransformError::Io(_) => TransformErrorKind::Io,
        }
    }

    /// Whether the caller's input caused the failure
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.kind(),
            TransformErrorKind::NoValidInputs
                | TransformErrorKind::InvalidRange
                | TransformErrorKind::UnreadableInput
        )
    }

    pub(crate) fn unreadable(name: &str, detail: impl ToString) -> Self {
        TransformError::UnreadableInput {
            name: name.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Result type alias for transform operations
pub type Result<T> = std::result::Result<T, TransformError>;
