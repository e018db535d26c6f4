//! In-memory user table and identity provider, for tests and offline development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::error::IdentityError;
use super::provider::IdentityProvider;
use super::service::UserRepository;
use super::types::{LocalUser, RemoteIdentity, UserPatch};

/// [`UserRepository`] over a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<String, LocalUser>>,
}

impl InMemoryUserRepository {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, LocalUser>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn upsert_stub(&self, user_id: &str) -> Result<(), IdentityError> {
        self.lock()
            .entry(user_id.to_string())
            .or_insert_with(|| LocalUser {
                id: user_id.to_string(),
                light_theme: false,
                files_list_view: false,
                first_login_timestamp: Utc::now(),
            });
        Ok(())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<LocalUser>, IdentityError> {
        Ok(self.lock().get(user_id).cloned())
    }

    async fn update_prefs(&self, user_id: &str, patch: &UserPatch) -> Result<(), IdentityError> {
        if let Some(user) = self.lock().get_mut(user_id) {
            if let Some(light_theme) = patch.light_theme {
                user.light_theme = light_theme;
            }
            if let Some(files_list_view) = patch.files_list_view {
                user.files_list_view = files_list_view;
            }
        }
        Ok(())
    }
}

/// [`IdentityProvider`] answering from a fixed credential table.
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    identities: HashMap<String, RemoteIdentity>,
    lookups: AtomicUsize,
}

impl StaticIdentityProvider {
    /// Create an empty table; every credential is rejected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `credential` as `identity`.
    #[must_use]
    pub fn with(mut self, credential: &str, identity: RemoteIdentity) -> Self {
        self.identities.insert(credential.to_string(), identity);
        self
    }

    /// Number of `resolve` calls so far.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, credential: &str) -> Result<Option<RemoteIdentity>, IdentityError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.identities.get(credential).cloned())
    }
}
