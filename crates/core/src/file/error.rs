//! File service error types.

use debris_shared::AppError;
use thiserror::Error;
use tracing::error;

use crate::storage::StorageError;

/// File operation errors.
#[derive(Debug, Error)]
pub enum FileError {
    /// No file with this id, or the name does not match.
    #[error("file not found")]
    NotFound,

    /// The file belongs to someone else.
    #[error("user not permitted")]
    Forbidden,

    /// Upload without file content.
    #[error("mandatory field {0} absent")]
    Missing(String),

    /// Name violates length limits.
    #[error("field {field} out of constraints ({constraints})")]
    InvalidName {
        /// Offending field.
        field: String,
        /// Constraint description.
        constraints: String,
    },

    /// Upload exceeds the size limit.
    #[error("file too large: {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge {
        /// Actual size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// Absolute URLs requested without a public domain configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl FileError {
    /// Create an invalid name error.
    #[must_use]
    pub fn invalid_name(field: impl Into<String>, constraints: impl Into<String>) -> Self {
        Self::InvalidName {
            field: field.into(),
            constraints: constraints.into(),
        }
    }

    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}

impl From<FileError> for AppError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NotFound => Self::not_found("file"),
            FileError::Forbidden => Self::Forbidden,
            FileError::Missing(field) => Self::MissingField(field),
            FileError::InvalidName { field, constraints } => {
                Self::OutOfConstraints { field, constraints }
            }
            FileError::FileTooLarge { max, .. } => Self::PayloadTooLarge(max),
            FileError::Configuration(_) | FileError::Storage(_) | FileError::Repository(_) => {
                error!(error = %err, "File operation failed");
                Self::Internal
            }
        }
    }
}
