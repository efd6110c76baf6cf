//! Upload pipeline error types.

use central_shared::AppError;
use thiserror::Error;

use crate::storage::StorageError;

/// Upload operation errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// No bytes were received.
    #[error("empty body")]
    EmptyInput,

    /// Multipart request without a `file` field.
    #[error("missing file field")]
    MissingFile,

    /// Request body stream broke off or was malformed.
    #[error("failed to read request body: {0}")]
    Body(String),

    /// Payload exceeds the configured ceiling.
    #[error("file too large: {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge {
        /// Bytes received before rejecting (at least `max + 1`).
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Upload settings could not be turned into a policy.
    #[error("invalid upload configuration: {0}")]
    Configuration(String),

    /// Request temp file could not be created or written.
    #[error("temp file error: {0}")]
    TempFile(#[source] std::io::Error),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl UploadError {
    /// Create a body read error.
    #[must_use]
    pub fn body(msg: impl Into<String>) -> Self {
        Self::Body(msg.into())
    }

    /// Create a file too large error.
    #[must_use]
    pub fn file_too_large(size: u64, max: u64) -> Self {
        Self::FileTooLarge { size, max }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::EmptyInput | UploadError::MissingFile | UploadError::Body(_) => {
                Self::Validation(err.to_string())
            }
            UploadError::FileTooLarge { .. } => Self::PayloadTooLarge("file too large".to_string()),
            UploadError::Configuration(msg) => Self::Configuration(msg),
            // Transport and disk detail stays in the server log
            UploadError::TempFile(_) | UploadError::Storage(_) => {
                Self::ExternalService("upload failed".to_string())
            }
        }
    }
}
