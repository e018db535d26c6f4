//! Application-wide error types.
//!
//! Every error that reaches a client carries an HTTP status and a stable
//! numeric code so that clients can branch on semantics instead of parsing
//! messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// A mandatory request field is absent.
    #[error("mandatory field {0} absent")]
    MissingField(String),

    /// A request field violates its constraints.
    #[error("field {field} out of constraints ({constraints})")]
    OutOfConstraints {
        /// Name of the offending field.
        field: String,
        /// Human readable description of the constraints.
        constraints: String,
    },

    /// Credential missing or rejected by the identity provider.
    #[error("authorization data missing or invalid")]
    Unauthorized,

    /// The authenticated user may not act on the resource.
    #[error("user not permitted")]
    Forbidden,

    /// No route matches the request path.
    #[error("endpoint not found")]
    EndpointNotFound,

    /// The addressed resource does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The route exists but not for this method.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Request payload exceeds the accepted size.
    #[error("payload too large (maximum {0}B)")]
    PayloadTooLarge(u64),

    /// Anything else. Details are logged, never sent to clients.
    #[error("internal error")]
    Internal,
}

impl AppError {
    /// Creates a missing field error.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    /// Creates an out of constraints error.
    #[must_use]
    pub fn out_of_constraints(field: impl Into<String>, constraints: impl Into<String>) -> Self {
        Self::OutOfConstraints {
            field: field.into(),
            constraints: constraints.into(),
        }
    }

    /// Creates a not found error for the named resource kind (e.g. `file`).
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::MissingField(_) | Self::OutOfConstraints { .. } => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::EndpointNotFound | Self::NotFound(_) => 404,
            Self::MethodNotAllowed => 405,
            Self::PayloadTooLarge(_) => 413,
            Self::Internal => 500,
        }
    }

    /// Returns the stable numeric error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MissingField(_) => 40000,
            Self::OutOfConstraints { .. } => 40001,
            Self::Unauthorized => 40100,
            Self::Forbidden => 40300,
            Self::EndpointNotFound => 40400,
            Self::NotFound(_) => 40401,
            Self::MethodNotAllowed => 40500,
            Self::PayloadTooLarge(_) => 41300,
            Self::Internal => 50000,
        }
    }

    /// Builds the wire representation of this error.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            status: self.status_code(),
            code: self.error_code(),
            message: self.to_string(),
        }
    }
}

/// JSON body sent with every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP status code.
    pub status: u16,
    /// Stable numeric error code.
    pub code: u32,
    /// Error message.
    pub message: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
