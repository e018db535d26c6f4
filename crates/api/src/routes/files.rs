//! Routes addressing a single file by id and name.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use debris_core::file::{File, FilePatch};

use crate::{AppState, error::ApiResult, extractors::Patch, middleware::AuthUser};

/// Creates the file routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/files/{attachment_id}/{name}",
        get(get_file).patch(rename_file).delete(delete_file),
    )
}

async fn get_file(
    State(state): State<AppState>,
    user: AuthUser,
    Path((attachment_id, name)): Path<(String, String)>,
) -> ApiResult<Json<File>> {
    let file = state
        .files
        .retrieve(&attachment_id, Some(&name), Some(user.user_id()))
        .await?;
    Ok(Json(file))
}

async fn rename_file(
    State(state): State<AppState>,
    user: AuthUser,
    Path((attachment_id, name)): Path<(String, String)>,
    Patch(patch): Patch<FilePatch>,
) -> ApiResult<Json<File>> {
    let file = state
        .files
        .rename(&attachment_id, &name, user.user_id(), patch)
        .await?;
    Ok(Json(file))
}

pub(crate) async fn delete_file(
    State(state): State<AppState>,
    user: AuthUser,
    Path((attachment_id, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .files
        .delete(&attachment_id, &name, user.user_id())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
