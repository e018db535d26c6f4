//! Deduplicating access log.

use std::sync::Arc;

use async_trait::async_trait;
use debris_shared::AppError;
use thiserror::Error;
use tracing::{debug, error};

use super::fingerprint::Fingerprint;

/// An access is only logged again once this many seconds passed since the
/// last identical one.
pub const DEDUP_WINDOW_SECS: u32 = 300;

const MAX_IP_LENGTH: usize = 39;
const MAX_USER_AGENT_LENGTH: usize = 255;
const MAX_USERNAME_LENGTH: usize = 32;

/// Access ledger errors.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl AccessError {
    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        error!(error = %err, "Access ledger failed");
        Self::Internal
    }
}

/// Network-level signals of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client address.
    pub ip: String,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Create client info.
    #[must_use]
    pub fn new(ip: impl Into<String>, user_agent: Option<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent,
        }
    }
}

/// Identity attached to an access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessIdentity {
    /// Remote user id.
    pub user_id: String,
    /// Remote username.
    pub username: String,
    /// Remote discriminator.
    pub discriminator: String,
}

/// Row to append to the access log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccess {
    /// Fingerprint in stored (hex) form.
    pub hash: String,
    /// Client address.
    pub ip: String,
    /// `User-Agent`.
    pub user_agent: Option<String>,
    /// Identity, when the request was authorized.
    pub identity: Option<AccessIdentity>,
}

/// Repository trait for access log persistence.
#[async_trait]
pub trait AccessRepository: Send + Sync {
    /// Whether a row with `hash` was written within the last `window_secs`,
    /// measured with the database clock.
    async fn recent_access_exists(&self, hash: &str, window_secs: u32) -> Result<bool, AccessError>;

    /// Append a row. The database assigns id and timestamp.
    async fn insert_access(&self, access: &NewAccess) -> Result<(), AccessError>;
}

/// Writes access rows unless an identical access was seen recently.
#[derive(Clone)]
pub struct AccessLedger {
    repo: Arc<dyn AccessRepository>,
    window_secs: u32,
}

impl AccessLedger {
    /// Create a ledger with the default 5 minute window.
    #[must_use]
    pub fn new(repo: Arc<dyn AccessRepository>) -> Self {
        Self {
            repo,
            window_secs: DEDUP_WINDOW_SECS,
        }
    }

    /// Record an access. Returns `true` if a row was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn register(
        &self,
        client: &ClientInfo,
        identity: Option<&AccessIdentity>,
    ) -> Result<bool, AccessError> {
        let fingerprint = Fingerprint::compute(
            &client.ip,
            client.user_agent.as_deref(),
            identity.map(|i| [i.user_id.as_str(), i.username.as_str(), i.discriminator.as_str()]),
        );
        let hash = fingerprint.to_hex();

        if self.repo.recent_access_exists(&hash, self.window_secs).await? {
            debug!(%hash, "Access seen recently, not logged");
            return Ok(false);
        }

        let access = NewAccess {
            hash,
            ip: truncate(&client.ip, MAX_IP_LENGTH),
            user_agent: client
                .user_agent
                .as_deref()
                .map(|ua| truncate(ua, MAX_USER_AGENT_LENGTH)),
            identity: identity.map(|i| AccessIdentity {
                username: truncate(&i.username, MAX_USERNAME_LENGTH),
                ..i.clone()
            }),
        };
        self.repo.insert_access(&access).await?;
        debug!(hash = %access.hash, ip = %access.ip, "Access logged");
        Ok(true)
    }

    /// Record an access in the background; failures are only logged.
    pub fn register_detached(&self, client: ClientInfo, identity: Option<AccessIdentity>) {
        let ledger = self.clone();
        tokio::spawn(async move {
            if let Err(err) = ledger.register(&client, identity.as_ref()).await {
                error!(error = %err, ip = %client.ip, "Failed to log access");
            }
        });
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
