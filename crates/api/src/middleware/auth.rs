//! Credential resolution for API routes.
//!
//! The credential is looked for in the `Authorization: Bearer` header, the
//! `accessToken` query parameter (GET only), an `accessToken` field of a JSON
//! or form body, and finally the `accessToken` cookie. The first one found
//! wins. Resolution never rejects a request by itself; handlers that need a
//! user ask for [`AuthUser`].

use std::net::SocketAddr;

use axum::{
    Form, Json,
    body::{Body, to_bytes},
    extract::{ConnectInfo, FromRequest, FromRequestParts, Query, Request, State},
    http::{
        HeaderMap, Method, Uri,
        header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
        request::Parts,
    },
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use bytes::Bytes;
use debris_core::{access::ClientInfo, identity::User};
use debris_shared::AppError;
use serde::Deserialize;

use crate::{AppState, error::ApiError};

/// Name of the credential in queries, bodies and cookies.
pub const ACCESS_TOKEN: &str = "accessToken";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Default, Deserialize)]
struct CredentialField {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
}

impl CredentialField {
    fn into_token(self) -> Option<String> {
        self.access_token.filter(|t| !t.trim().is_empty())
    }
}

/// Middleware resolving the request credential to a [`User`].
///
/// The user, if any, is stored in request extensions.
pub async fn resolve_user(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_info(&request, state.trust_forwarded_for);
    let (mut request, credential) = extract_credential(request, state.body_limit).await?;

    let user = state
        .identity
        .authorize(credential.as_deref(), &client)
        .await?;

    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}

/// Finds the credential, buffering and restoring the body when it may carry one.
async fn extract_credential(
    request: Request,
    body_limit: usize,
) -> Result<(Request, Option<String>), ApiError> {
    if let Some(token) = bearer_token(request.headers()) {
        return Ok((request, Some(token)));
    }

    if request.method() == Method::GET
        && let Some(token) = query_token(request.uri())
    {
        return Ok((request, Some(token)));
    }

    let (request, body_token) = body_token(request, body_limit).await?;
    if body_token.is_some() {
        return Ok((request, body_token));
    }

    let token = CookieJar::from_headers(request.headers())
        .get(ACCESS_TOKEN)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.trim().is_empty());
    Ok((request, token))
}

/// Extracts the token from an `Authorization: Bearer` header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn query_token(uri: &Uri) -> Option<String> {
    Query::<CredentialField>::try_from_uri(uri)
        .ok()
        .and_then(|Query(field)| field.into_token())
}

async fn body_token(
    request: Request,
    body_limit: usize,
) -> Result<(Request, Option<String>), ApiError> {
    let Some(kind) = body_kind(request.headers()) else {
        return Ok((request, None));
    };

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, body_limit)
        .await
        .map_err(|_| ApiError(AppError::PayloadTooLarge(body_limit as u64)))?;

    let token = match kind {
        BodyKind::Json => Json::<CredentialField>::from_bytes(&bytes)
            .ok()
            .and_then(|Json(field)| field.into_token()),
        BodyKind::Form => form_token(bytes.clone()).await,
    };

    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

#[derive(Clone, Copy)]
enum BodyKind {
    Json,
    Form,
}

fn body_kind(headers: &HeaderMap) -> Option<BodyKind> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let essence = content_type.split(';').next()?.trim();
    if essence.eq_ignore_ascii_case("application/json") {
        Some(BodyKind::Json)
    } else if essence.eq_ignore_ascii_case(FORM_CONTENT_TYPE) {
        Some(BodyKind::Form)
    } else {
        None
    }
}

async fn form_token(bytes: Bytes) -> Option<String> {
    let scratch = Request::builder()
        .method(Method::POST)
        .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
        .body(Body::from(bytes))
        .ok()?;
    Form::<CredentialField>::from_request(scratch, &())
        .await
        .ok()
        .and_then(|Form(field)| field.into_token())
}

/// Network signals of a request: client address and user agent.
///
/// `X-Forwarded-For` is only read when `trust_forwarded_for` is set, since
/// any client can send it.
pub fn client_info(request: &Request, trust_forwarded_for: bool) -> ClientInfo {
    let headers = request.headers();
    let forwarded = trust_forwarded_for
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(ToString::to_string);

    let ip = forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_canonical().to_string())
        })
        .unwrap_or_else(|| "0.0.0.0".to_string());

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(ToString::to_string);

    ClientInfo::new(ip, user_agent)
}

/// Extractor for the authenticated user.
///
/// Rejects with `40100` when the credential was missing or not accepted.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    /// Returns the user ID.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.0.id
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(AuthUser)
            .ok_or(ApiError(AppError::Unauthorized))
    }
}
