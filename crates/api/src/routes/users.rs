//! Routes for the authenticated user and their files.

use axum::{
    Json, Router,
    extract::{
        Multipart, Query, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    routing::get,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use debris_core::{
    file::{File, FileListing, ListFilesQuery, MAX_FILE_SIZE},
    identity::{User, UserPatch},
};
use debris_shared::{AppError, types::TimeWindow};
use serde::Deserialize;
use tracing::debug;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    extractors::Patch,
    middleware::AuthUser,
};

/// Multipart field carrying the upload.
pub const FILE_FIELD: &str = "file";

/// Creates the user routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/@me", get(get_me).patch(update_me))
        .route("/users/@me/files", get(list_files).post(upload_file))
}

/// Largest page size; `LIMIT` is bound as a signed `BIGINT`.
const MAX_LIMIT: u64 = i64::MAX.unsigned_abs();

/// Query parameters of the file listing.
///
/// Kept as strings so that unparsable limits behave like absent ones.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Page size.
    pub limit: Option<String>,
    /// ISO 8601 upper bound, exclusive.
    pub before: Option<String>,
    /// ISO 8601 lower bound, exclusive.
    pub after: Option<String>,
}

impl ListParams {
    fn into_query(self) -> ApiResult<ListFilesQuery> {
        Ok(ListFilesQuery {
            limit: self
                .limit
                .and_then(|l| l.trim().parse::<u64>().ok())
                .map(|l| l.min(MAX_LIMIT)),
            window: TimeWindow {
                before: parse_timestamp("before", self.before.as_deref())?,
                after: parse_timestamp("after", self.after.as_deref())?,
            },
        })
    }
}

fn parse_timestamp(field: &str, value: Option<&str>) -> ApiResult<Option<DateTime<Utc>>> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|_| ApiError(AppError::out_of_constraints(field, "ISO 8601 timestamp")))
        })
        .transpose()
}

async fn get_me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Patch(patch): Patch<UserPatch>,
) -> ApiResult<Json<User>> {
    let user = state.identity.update_user(user, patch).await?;
    Ok(Json(user))
}

async fn list_files(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    params: Result<Query<ListParams>, axum::extract::rejection::QueryRejection>,
) -> ApiResult<Json<FileListing>> {
    let Query(params) = params
        .map_err(|_| ApiError(AppError::out_of_constraints("query", "valid query string")))?;
    let query = params.into_query()?;
    let listing = state.files.list(&user.id, query).await?;
    Ok(Json(listing))
}

async fn upload_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<File>)> {
    let mut multipart = multipart.map_err(|_| ApiError(AppError::missing_field(FILE_FIELD)))?;
    let Some((name, bytes)) = read_file_field(&mut multipart).await? else {
        return Err(ApiError(AppError::missing_field(FILE_FIELD)));
    };

    debug!(user_id = %user.id, name = %name, size = bytes.len(), "Upload received");
    let file = state.files.upload(&user.id, &name, bytes).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

async fn read_file_field(multipart: &mut Multipart) -> ApiResult<Option<(String, Bytes)>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Some((name, bytes)));
    }
    Ok(None)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError(AppError::PayloadTooLarge(MAX_FILE_SIZE))
    } else {
        ApiError(AppError::missing_field(FILE_FIELD))
    }
}
