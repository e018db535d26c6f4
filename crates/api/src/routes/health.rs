//! Health check endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use debris_core::storage::AdapterState;
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Storage adapter state.
    pub storage: &'static str,
}

/// Health check handler. Unhealthy while the adapter cannot serve blobs.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = state.files.storage().state();
    let (code, status) = match storage {
        AdapterState::Ready => (StatusCode::OK, "healthy"),
        AdapterState::Degraded => (StatusCode::OK, "degraded"),
        AdapterState::Connecting | AdapterState::Closed => {
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            storage: storage.as_str(),
        }),
    )
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
