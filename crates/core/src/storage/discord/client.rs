//! Rate-limit aware REST client.
//!
//! Every call takes a permit from a semaphore (bounded concurrency), runs
//! under a deadline, and is retried with jittered backoff on 429, 5xx,
//! timeouts and connection errors. `POST` creates remote state and may have
//! landed even when the answer was lost, so it is only retried on 429.
//! Rate limiting moves the shared [`Readiness`] to `Degraded`; the next
//! success moves it back.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::models::{ErrorBody, RateLimitBody};
use crate::storage::retry::RetryPolicy;
use crate::storage::state::Readiness;
use crate::storage::StorageError;

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/debris-storage/debris, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Upper bound on a server-provided `retry_after`.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Failures a request may be repeated after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    /// Any retryable failure.
    Transient,
    /// Only 429, which Discord answers before doing anything.
    RateLimitOnly,
}

impl Replay {
    fn for_method(method: &Method) -> Self {
        if *method == Method::POST {
            Self::RateLimitOnly
        } else {
            Self::Transient
        }
    }

    fn allows(self, err: &StorageError) -> bool {
        match self {
            Self::Transient => err.is_retryable(),
            Self::RateLimitOnly => matches!(err, StorageError::RateLimited { .. }),
        }
    }
}

/// Authenticated Discord REST client.
pub struct DiscordHttp {
    http: reqwest::Client,
    api_base: String,
    authorization: String,
    timeout: Duration,
    retry: RetryPolicy,
    permits: Semaphore,
    readiness: Arc<Readiness>,
}

impl std::fmt::Debug for DiscordHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordHttp")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl DiscordHttp {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the TLS backend cannot be initialized.
    pub fn new(
        api_base: &str,
        bot_token: &str,
        request_timeout: Duration,
        retry: RetryPolicy,
        max_in_flight: usize,
        readiness: Arc<Readiness>,
    ) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StorageError::configuration(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            authorization: format!("Bot {bot_token}"),
            timeout: request_timeout,
            retry,
            permits: Semaphore::new(max_in_flight.max(1)),
            readiness,
        })
    }

    fn api(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.api_base))
            .header(AUTHORIZATION, &self.authorization)
    }

    /// `GET` an API path and decode the JSON answer.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, StorageError> {
        let response = self
            .send(Replay::Transient, || self.api(Method::GET, path))
            .await?;
        self.read_json(response).await
    }

    /// Send a JSON body and decode the JSON answer.
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, StorageError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let replay = Replay::for_method(&method);
        let response = self
            .send(replay, || self.api(method.clone(), path).json(body))
            .await?;
        self.read_json(response).await
    }

    /// `DELETE` an API path, ignoring the body.
    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.send(Replay::Transient, || self.api(Method::DELETE, path))
            .await
            .map(|_| ())
    }

    /// Post a single file with its `payload_json`.
    ///
    /// Only retried on 429: after a timeout or a 5xx the message may exist.
    pub async fn post_file<T: DeserializeOwned>(
        &self,
        path: &str,
        payload_json: &str,
        filename: &str,
        bytes: &Bytes,
    ) -> Result<T, StorageError> {
        let length = bytes.len() as u64;
        let response = self
            .send(Replay::RateLimitOnly, || {
                let file = Part::stream_with_length(bytes.clone(), length)
                    .file_name(filename.to_string());
                let form = Form::new()
                    .text("payload_json", payload_json.to_string())
                    .part("files[0]", file);
                self.api(Method::POST, path).multipart(form)
            })
            .await?;
        self.read_json(response).await
    }

    /// Unauthenticated `GET` of an absolute URL (CDN).
    pub async fn fetch(&self, url: &str) -> Result<Response, StorageError> {
        self.send(Replay::Transient, || self.http.get(url)).await
    }

    /// Read a response body under the request deadline.
    pub async fn read_bytes(&self, response: Response) -> Result<Bytes, StorageError> {
        timeout(self.timeout, response.bytes())
            .await
            .map_err(|_| StorageError::Timeout)?
            .map_err(StorageError::from)
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, StorageError> {
        let body = self.read_bytes(response).await?;
        serde_json::from_slice(&body).map_err(|e| StorageError::decode(e.to_string()))
    }

    async fn send<F>(&self, replay: Replay, build: F) -> Result<Response, StorageError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let outcome = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| StorageError::NotReady)?;
                match timeout(self.timeout, build().send()).await {
                    Err(_) => Err(StorageError::Timeout),
                    Ok(Err(err)) => Err(StorageError::from(err)),
                    Ok(Ok(response)) => self.check_status(response).await,
                }
            };

            match outcome {
                Ok(response) => {
                    self.readiness.mark_recovered();
                    return Ok(response);
                }
                Err(err) if replay.allows(&err) && attempt < self.retry.max_retries => {
                    self.readiness.mark_degraded();
                    let hint = match &err {
                        StorageError::RateLimited { retry_after } => Some(*retry_after),
                        _ => None,
                    };
                    let delay = self.retry.delay(attempt, hint);
                    warn!(attempt, ?delay, error = %err, "Retrying storage request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        self.readiness.mark_degraded();
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn check_status(&self, response: Response) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let header_hint = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok());
        let body = timeout(self.timeout, response.bytes())
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default();

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let parsed = serde_json::from_slice::<RateLimitBody>(&body).ok();
                let global = parsed.as_ref().is_some_and(|b| b.global);
                let retry_after = parsed
                    .map(|b| b.retry_after)
                    .or(header_hint)
                    .and_then(seconds)
                    .unwrap_or(Duration::from_secs(1));
                debug!(?retry_after, global, "Rate limited by storage backend");
                Err(StorageError::RateLimited { retry_after })
            }
            StatusCode::NOT_FOUND => Err(StorageError::not_found(error_message(&body, status))),
            _ => Err(StorageError::Remote {
                status: status.as_u16(),
                message: error_message(&body, status),
            }),
        }
    }
}

fn seconds(value: f64) -> Option<Duration> {
    (value.is_finite() && value >= 0.0)
        .then(|| Duration::from_secs_f64(value).min(MAX_RETRY_AFTER))
}

fn error_message(body: &[u8], status: StatusCode) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .filter(|b| !b.message.is_empty())
        .map_or_else(
            || status.canonical_reason().unwrap_or("error").to_string(),
            |b| format!("{} (code {})", b.message, b.code),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_only_replays_rate_limits() {
        let replay = Replay::for_method(&Method::POST);
        assert!(replay.allows(&StorageError::RateLimited {
            retry_after: Duration::from_secs(1)
        }));
        assert!(!replay.allows(&StorageError::Timeout));
        assert!(!replay.allows(&StorageError::Remote {
            status: 502,
            message: "Bad Gateway".into()
        }));

        let replay = Replay::for_method(&Method::PATCH);
        assert!(replay.allows(&StorageError::Timeout));
        assert_eq!(Replay::for_method(&Method::GET), Replay::Transient);
    }

    #[test]
    fn test_seconds_rejects_garbage() {
        assert_eq!(seconds(f64::NAN), None);
        assert_eq!(seconds(-1.0), None);
        assert_eq!(seconds(0.5), Some(Duration::from_millis(500)));
        assert_eq!(seconds(1e9), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn test_error_message_prefers_body() {
        let body = br#"{"code": 10008, "message": "Unknown Message"}"#;
        assert_eq!(
            error_message(body, StatusCode::NOT_FOUND),
            "Unknown Message (code 10008)"
        );
        assert_eq!(error_message(b"", StatusCode::BAD_GATEWAY), "Bad Gateway");
    }
}
