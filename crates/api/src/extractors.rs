//! Request extractors.

use axum::{
    Form,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use debris_shared::AppError;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// A patch document from a JSON or form body.
///
/// An empty body is an empty patch. Unlike `axum::Json` a missing
/// `Content-Type` is accepted and read as JSON.
#[derive(Debug, Clone, Default)]
pub struct Patch<T>(pub T);

impl<S, T> FromRequest<S> for Patch<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            return Form::<T>::from_request(req, state)
                .await
                .map(|Form(patch)| Self(patch))
                .map_err(|_| invalid_body());
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| invalid_body())?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|_| invalid_body())
    }
}

fn invalid_body() -> ApiError {
    ApiError(AppError::out_of_constraints("body", "JSON or form encoded object"))
}
