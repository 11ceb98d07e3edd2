//! Error types for annotation bookkeeping

use thiserror::Error;

use super::model::AnnotationId;

/// Errors raised by annotation operations that cannot degrade to a no-op
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// No annotation with this id exists
    #[error("Unknown annotation: {0}")]
    UnknownAnnotation(AnnotationId),

    /// A note needs some text
    #[error("Note content is empty")]
    EmptyNote,

    /// Export written by a newer format revision
    #[error("Unsupported export version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },

    /// Export is for a different article
    #[error("Export belongs to article {found:?}, expected {expected:?}")]
    ArticleMismatch {
        /// Article id in the export
        found: String,
        /// Article being restored
        expected: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
