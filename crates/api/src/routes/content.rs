//! File content proxy.
//!
//! `GET /files/{attachment_id}/{name}` streams the blob back with the cache
//! metadata reported by the backend. Image transformation parameters
//! (`width`, `height`, `fit`, `format`, `quality`) are accepted and ignored.
//! `DELETE` on the same path removes the file for an identified owner.

use axum::{
    Router,
    extract::{Path, State},
    middleware,
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, LAST_MODIFIED},
    },
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use debris_core::storage::BlobContent;

use super::files::delete_file;
use crate::{AppState, error::ApiResult, middleware::resolve_user};

/// Creates the content routes, mounted at `/files`.
#[allow(clippy::needless_pass_by_value)]
pub fn routes(state: AppState) -> Router<AppState> {
    let removal = delete(delete_file).layer(middleware::from_fn_with_state(state, resolve_user));
    Router::new().route("/{attachment_id}/{name}", get(fetch_file).merge(removal))
}

async fn fetch_file(
    State(state): State<AppState>,
    Path((attachment_id, name)): Path<(String, String)>,
) -> ApiResult<Response> {
    let (_, content) = state.files.fetch_content(&attachment_id, &name).await?;
    let headers = forwarded_headers(&content);
    Ok((StatusCode::OK, headers, content.bytes).into_response())
}

fn forwarded_headers(content: &BlobContent) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let pairs: [(HeaderName, Option<&str>); 4] = [
        (CONTENT_TYPE, content.content_type.as_deref()),
        (CACHE_CONTROL, content.cache_control.as_deref()),
        (ETAG, content.etag.as_deref()),
        (LAST_MODIFIED, content.last_modified.as_deref()),
    ];
    for (name, value) in pairs {
        if let Some(value) = value.and_then(|v| HeaderValue::from_str(v).ok()) {
            headers.insert(name, value);
        }
    }
    headers
}
