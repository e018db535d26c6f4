//! User types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::AccessIdentity;

/// Identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteIdentity {
    /// Remote user id.
    pub id: String,
    /// Username.
    pub username: String,
    /// Discriminator (`"0"` for migrated accounts).
    #[serde(default)]
    pub discriminator: Option<String>,
    /// Avatar hash.
    #[serde(default)]
    pub avatar: Option<String>,
}

impl RemoteIdentity {
    /// Identity triple recorded in the access log.
    #[must_use]
    pub fn access_identity(&self) -> AccessIdentity {
        AccessIdentity {
            user_id: self.id.clone(),
            username: self.username.clone(),
            discriminator: self.discriminator.clone().unwrap_or_default(),
        }
    }
}

/// Locally stored user preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    /// Remote user id.
    pub id: String,
    /// Light theme enabled.
    pub light_theme: bool,
    /// Files shown as a list instead of a grid.
    pub files_list_view: bool,
    /// First time this user was seen.
    pub first_login_timestamp: DateTime<Utc>,
}

/// Remote identity merged with local preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Remote user id.
    pub id: String,
    /// Username.
    pub username: String,
    /// Discriminator.
    pub discriminator: Option<String>,
    /// Avatar hash.
    pub avatar: Option<String>,
    /// Light theme enabled.
    pub light_theme: bool,
    /// Files shown as a list.
    pub files_list_view: bool,
    /// First time this user was seen.
    pub first_login_timestamp: DateTime<Utc>,
}

impl User {
    /// Merge a remote identity with its local row.
    #[must_use]
    pub fn merge(remote: RemoteIdentity, local: LocalUser) -> Self {
        Self {
            id: remote.id,
            username: remote.username,
            discriminator: remote.discriminator,
            avatar: remote.avatar,
            light_theme: local.light_theme,
            files_list_view: local.files_list_view,
            first_login_timestamp: local.first_login_timestamp,
        }
    }

    /// Apply a patch in place.
    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(light_theme) = patch.light_theme {
            self.light_theme = light_theme;
        }
        if let Some(files_list_view) = patch.files_list_view {
            self.files_list_view = files_list_view;
        }
    }
}

/// Preference changes. Absent fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    /// New light theme flag.
    #[serde(default)]
    pub light_theme: Option<bool>,
    /// New list view flag.
    #[serde(default)]
    pub files_list_view: Option<bool>,
}

impl UserPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.light_theme.is_none() && self.files_list_view.is_none()
    }
}
