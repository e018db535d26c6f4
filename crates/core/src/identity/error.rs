//! Identity error types.

use debris_shared::AppError;
use thiserror::Error;
use tracing::error;

/// Identity resolution errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider call exceeded its deadline.
    #[error("identity request timed out")]
    Timeout,

    /// Connection-level failure.
    #[error("identity transport error: {0}")]
    Transport(String),

    /// The provider answered with an unexpected status.
    #[error("identity provider returned {0}")]
    Remote(u16),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl IdentityError {
    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        error!(error = %err, "Identity resolution failed");
        Self::Internal
    }
}
