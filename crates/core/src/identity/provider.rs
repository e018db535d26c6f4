//! Bearer credential to remote identity.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;

use super::error::IdentityError;
use super::types::RemoteIdentity;

/// Exchanges a bearer credential for the identity it belongs to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the provider rejects the credential.
    async fn resolve(&self, credential: &str) -> Result<Option<RemoteIdentity>, IdentityError>;
}

/// Resolves OAuth2 bearer tokens through `GET /users/@me`.
#[derive(Debug, Clone)]
pub struct DiscordIdentityProvider {
    http: reqwest::Client,
    api_base: String,
}

impl DiscordIdentityProvider {
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(IdentityError::from)?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for DiscordIdentityProvider {
    async fn resolve(&self, credential: &str) -> Result<Option<RemoteIdentity>, IdentityError> {
        let response = self
            .http
            .get(format!("{}/users/@me", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {credential}"))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let identity = response.json::<RemoteIdentity>().await?;
                Ok(Some(identity))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(IdentityError::Remote(status.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use serde_json::json;

    use super::*;

    async fn serve() -> String {
        async fn me(headers: HeaderMap) -> (StatusCode, axum::Json<serde_json::Value>) {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Bearer good") => (
                    StatusCode::OK,
                    axum::Json(json!({
                        "id": "80351110224678912",
                        "username": "nelly",
                        "discriminator": "1337",
                        "avatar": "8342729096ea3675442027381ff50dfe"
                    })),
                ),
                Some("Bearer flaky") => (StatusCode::BAD_GATEWAY, axum::Json(json!({}))),
                _ => (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(json!({"message": "401: Unauthorized", "code": 0})),
                ),
            }
        }

        let app = Router::new().route("/api/users/@me", get(me));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/api")
    }

    #[tokio::test]
    async fn test_resolves_valid_credential() {
        let base = serve().await;
        let provider = DiscordIdentityProvider::new(&base, Duration::from_secs(2)).unwrap();

        let identity = provider.resolve("good").await.unwrap().unwrap();
        assert_eq!(identity.id, "80351110224678912");
        assert_eq!(identity.username, "nelly");
        assert_eq!(identity.discriminator.as_deref(), Some("1337"));
    }

    #[tokio::test]
    async fn test_rejected_credential_is_none() {
        let base = serve().await;
        let provider = DiscordIdentityProvider::new(&base, Duration::from_secs(2)).unwrap();
        assert_eq!(provider.resolve("bad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_provider_failure_is_error() {
        let base = serve().await;
        let provider = DiscordIdentityProvider::new(&base, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            provider.resolve("flaky").await,
            Err(IdentityError::Remote(502))
        ));
    }
}
