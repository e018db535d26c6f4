//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes under `/api/v1`
//! - The file content proxy under `/files`
//! - Credential resolution middleware
//! - JSON error bodies for every failure, including unknown routes

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;

pub use error::{ApiError, ApiResult};

use axum::{Router, extract::DefaultBodyLimit, http::header::AUTHORIZATION};
use debris_core::{file::FileService, identity::IdentityResolver};
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

/// Default cap on request bodies, a little above the largest accepted file.
pub const DEFAULT_BODY_LIMIT: usize = 9_000_000;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// File operations over the blob store and the index.
    pub files: FileService,
    /// Credential resolution and user preferences.
    pub identity: IdentityResolver,
    /// Largest request body buffered or accepted.
    pub body_limit: usize,
    /// Whether `X-Forwarded-For` names the client.
    pub trust_forwarded_for: bool,
}

impl AppState {
    /// Creates state with the default body limit.
    #[must_use]
    pub fn new(files: FileService, identity: IdentityResolver) -> Self {
        Self {
            files,
            identity,
            body_limit: DEFAULT_BODY_LIMIT,
            trust_forwarded_for: false,
        }
    }

    /// Overrides the request body limit.
    #[must_use]
    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    /// Takes client addresses from `X-Forwarded-For`, for use behind a proxy.
    #[must_use]
    pub fn with_trusted_proxy(mut self, trust_forwarded_for: bool) -> Self {
        self.trust_forwarded_for = trust_forwarded_for;
        self
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .nest("/files", routes::content::routes(state.clone()))
        .fallback(routes::endpoint_not_found)
        .method_not_allowed_fallback(routes::method_not_allowed)
        .layer(DefaultBodyLimit::max(state.body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(SetSensitiveRequestHeadersLayer::new([AUTHORIZATION]))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
