//! Storage error types.

use std::time::Duration;

use thiserror::Error;

/// Remote storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The adapter has not finished connecting, or has been closed.
    #[error("storage adapter not ready")]
    NotReady,

    /// The remote unit does not exist (already deleted, or never existed).
    #[error("remote object not found: {what}")]
    NotFound {
        /// Description of what was looked up.
        what: String,
    },

    /// The remote call exceeded its deadline.
    #[error("storage request timed out")]
    Timeout,

    /// The remote backend kept rate limiting after all retries.
    #[error("rate limited by storage backend, retry after {retry_after:?}")]
    RateLimited {
        /// Backoff requested by the backend.
        retry_after: Duration,
    },

    /// The remote backend answered with an error status.
    #[error("storage backend returned {status}: {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Body or reason phrase.
        message: String,
    },

    /// Connection-level failure.
    #[error("storage transport error: {0}")]
    Transport(String),

    /// The backend answered with something we could not understand.
    #[error("unexpected storage response: {0}")]
    Decode(String),

    /// Storage provider configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Whether repeating the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::RateLimited { .. } | Self::Transport(_) => true,
            Self::Remote { status, .. } => *status >= 500,
            Self::NotReady | Self::NotFound { .. } | Self::Decode(_) | Self::Configuration(_) => {
                false
            }
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
