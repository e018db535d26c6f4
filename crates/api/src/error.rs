//! JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use debris_core::{file::FileError, identity::IdentityError};
use debris_shared::AppError;

/// An [`AppError`] rendered as `{status, code, message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError(pub AppError);

impl ApiError {
    /// The wrapped error.
    #[must_use]
    pub const fn inner(&self) -> &AppError {
        &self.0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.to_body())).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<FileError> for ApiError {
    fn from(err: FileError) -> Self {
        Self(err.into())
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        Self(err.into())
    }
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
