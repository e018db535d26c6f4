//! API route definitions.

use axum::{Router, middleware};
use debris_shared::AppError;

use crate::{AppState, error::ApiError, middleware::resolve_user};

pub mod content;
pub mod files;
pub mod health;
pub mod users;

/// Creates the API router; everything but health resolves the caller first.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let identified_routes = Router::new()
        .merge(users::routes())
        .merge(files::routes())
        .layer(middleware::from_fn_with_state(state.clone(), resolve_user));

    Router::new()
        .merge(health::routes())
        .merge(identified_routes)
        .method_not_allowed_fallback(method_not_allowed)
}

/// `40400` for unknown paths.
pub async fn endpoint_not_found() -> ApiError {
    ApiError(AppError::EndpointNotFound)
}

/// `40500` for known paths with an unsupported method.
pub async fn method_not_allowed() -> ApiError {
    ApiError(AppError::MethodNotAllowed)
}
