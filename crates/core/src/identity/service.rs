//! Identity resolver.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::error::IdentityError;
use super::provider::IdentityProvider;
use super::types::{LocalUser, RemoteIdentity, User, UserPatch};
use crate::access::{AccessLedger, ClientInfo};

const CACHE_CAPACITY: u64 = 10_000;

/// Repository trait for user persistence.
///
/// This trait is implemented by the db crate to provide actual database operations.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert `(user_id)` with default preferences unless it already exists.
    async fn upsert_stub(&self, user_id: &str) -> Result<(), IdentityError>;

    /// Find a user by id.
    async fn find_by_id(&self, user_id: &str) -> Result<Option<LocalUser>, IdentityError>;

    /// Write the fields present in `patch`.
    async fn update_prefs(&self, user_id: &str, patch: &UserPatch) -> Result<(), IdentityError>;
}

/// Turns credentials into users, lazily creating local rows.
///
/// Successful lookups are cached for a short TTL, keyed by a digest of the
/// credential. Every `authorize` call schedules an access ledger write.
#[derive(Clone)]
pub struct IdentityResolver {
    provider: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserRepository>,
    ledger: Option<AccessLedger>,
    cache: Cache<String, RemoteIdentity>,
}

impl IdentityResolver {
    /// Create a resolver caching identities for `cache_ttl`.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserRepository>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            users,
            ledger: None,
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(cache_ttl)
                .build(),
        }
    }

    /// Log every authorization attempt to `ledger`.
    #[must_use]
    pub fn with_ledger(mut self, ledger: AccessLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Resolve `credential` to a user.
    ///
    /// Missing, rejected or unverifiable credentials yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the local user row cannot be read or created.
    pub async fn authorize(
        &self,
        credential: Option<&str>,
        client: &ClientInfo,
    ) -> Result<Option<User>, IdentityError> {
        let remote = match credential.map(str::trim).filter(|c| !c.is_empty()) {
            Some(credential) => self.identify(credential).await,
            None => None,
        };

        let user = match &remote {
            Some(remote) => self.merge(remote.clone()).await.map(Some),
            None => Ok(None),
        };

        // The access row references the user row, so it is written after the
        // upsert, and without an identity when the upsert failed.
        if let Some(ledger) = &self.ledger {
            let identity = match (&remote, &user) {
                (Some(remote), Ok(Some(_))) => Some(remote.access_identity()),
                _ => None,
            };
            ledger.register_detached(client.clone(), identity);
        }

        user
    }

    /// Apply a preference patch. An empty patch writes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn update_user(&self, mut user: User, patch: UserPatch) -> Result<User, IdentityError> {
        if patch.is_empty() {
            return Ok(user);
        }
        self.users.update_prefs(&user.id, &patch).await?;
        user.apply(&patch);
        debug!(user_id = %user.id, ?patch, "User preferences updated");
        Ok(user)
    }

    async fn identify(&self, credential: &str) -> Option<RemoteIdentity> {
        let key = hex::encode(Sha256::digest(credential.as_bytes()));
        if let Some(identity) = self.cache.get(&key).await {
            return Some(identity);
        }

        match self.provider.resolve(credential).await {
            Ok(Some(identity)) => {
                self.cache.insert(key, identity.clone()).await;
                Some(identity)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "Identity provider unavailable, treating as anonymous");
                None
            }
        }
    }

    async fn merge(&self, remote: RemoteIdentity) -> Result<User, IdentityError> {
        self.users.upsert_stub(&remote.id).await?;
        let local = self
            .users
            .find_by_id(&remote.id)
            .await?
            .ok_or_else(|| IdentityError::repository(format!("user {} vanished", remote.id)))?;
        Ok(User::merge(remote, local))
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
