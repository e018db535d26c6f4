//! Storage container lifecycle and blob operations on Discord.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Method;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, HeaderMap, LAST_MODIFIED};
use tracing::{error, info, warn};

use super::client::DiscordHttp;
use super::models::{
    Application, CHANNEL_CATEGORY, CHANNEL_TEXT, CHANNEL_VOICE, Channel, CreateChannel,
    CreateGuild, CreateInvite, CreateMessage, CurrentUser, Guild, Invite, Message, ModifyChannel,
    ModifyGuild, PartialGuild,
};
use crate::storage::config::{DebugOptions, StorageConfig, StorageProvider};
use crate::storage::retry::RetryPolicy;
use crate::storage::state::{AdapterState, Readiness};
use crate::storage::types::{BlobContent, BlobReceipt};
use crate::storage::{BlobStore, StorageError};

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-').remove(b'_');

const PURGE_PAGE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    guild_id: String,
    channel_id: String,
}

/// [`BlobStore`] backed by a single guild owned by the bot.
///
/// `open` reconciles remote state: it leaves guilds owned by someone else,
/// creates the container guild if needed, applies debug switches and copies
/// the application's name and icon onto the guild.
#[derive(Debug)]
pub struct DiscordStorage {
    http: DiscordHttp,
    readiness: Arc<Readiness>,
    cdn_base: String,
    container_name: String,
    channel_name: String,
    debug: DebugOptions,
    target: RwLock<Option<Target>>,
}

impl DiscordStorage {
    /// Create an adapter in `Connecting` state. Nothing is sent until `open`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for a non-Discord provider.
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let StorageProvider::Discord {
            bot_token,
            api_base,
            cdn_base,
        } = config.provider
        else {
            return Err(StorageError::configuration(
                "DiscordStorage requires a discord provider",
            ));
        };

        let readiness = Arc::new(Readiness::new());
        let http = DiscordHttp::new(
            &api_base,
            &bot_token,
            config.request_timeout,
            RetryPolicy::new(config.max_retries),
            config.max_in_flight,
            Arc::clone(&readiness),
        )?;

        Ok(Self {
            http,
            readiness,
            cdn_base,
            container_name: config.container_name,
            channel_name: config.channel_name,
            debug: config.debug,
            target: RwLock::new(None),
        })
    }

    /// Id of the container guild once connected.
    #[must_use]
    pub fn container_id(&self) -> Option<String> {
        self.current_target().map(|t| t.guild_id)
    }

    /// Id of the storage channel once connected.
    #[must_use]
    pub fn channel_id(&self) -> Option<String> {
        self.current_target().map(|t| t.channel_id)
    }

    fn current_target(&self) -> Option<Target> {
        self.target
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn set_target(&self, target: Option<Target>) {
        *self
            .target
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = target;
    }

    async fn connect(&self) -> Result<Target, StorageError> {
        let me: CurrentUser = self.http.get_json("/users/@me").await?;
        info!(bot_id = %me.id, username = %me.username, "Logged in to storage backend");

        let guilds: Vec<PartialGuild> = self.http.get_json("/users/@me/guilds").await?;
        let mut container = guilds.iter().find(|g| g.owner).cloned();

        if self.debug.purge_on_start
            && let Some(guild) = &container
        {
            self.purge(&guild.id).await?;
        }

        for guild in &guilds {
            if !guild.owner {
                self.leave(guild).await?;
            } else if self.debug.reset_container {
                warn!(guild_id = %guild.id, "Deleting storage container (reset requested)");
                self.http.delete(&format!("/guilds/{}", guild.id)).await?;
            } else if container.as_ref().is_some_and(|c| c.id != guild.id) {
                warn!(guild_id = %guild.id, "Ignoring additional owned guild");
            }
        }
        if self.debug.reset_container {
            container = None;
        }

        let target = match container {
            Some(guild) => self.ensure_channel(&guild.id).await?,
            None => self.create_container().await?,
        };

        if self.debug.print_invite_on_ready {
            self.log_invite(&target).await;
        }
        if let Err(err) = self.sync_metadata(&target.guild_id).await {
            warn!(guild_id = %target.guild_id, error = %err, "Failed to sync container metadata");
        }

        Ok(target)
    }

    async fn leave(&self, guild: &PartialGuild) -> Result<(), StorageError> {
        info!(guild_id = %guild.id, name = %guild.name, "Leaving foreign guild");
        match self.http.delete(&format!("/users/@me/guilds/{}", guild.id)).await {
            Ok(()) | Err(StorageError::NotFound { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn create_container(&self) -> Result<Target, StorageError> {
        let guild: Guild = self
            .http
            .send_json(
                Method::POST,
                "/guilds",
                &CreateGuild {
                    name: &self.container_name,
                },
            )
            .await?;
        info!(guild_id = %guild.id, name = %guild.name, "Created storage container");

        let channels = self.channels(&guild.id).await?;
        let mut storage_channel = None;
        for channel in channels {
            match channel.kind {
                CHANNEL_CATEGORY | CHANNEL_VOICE => {
                    self.http.delete(&format!("/channels/{}", channel.id)).await?;
                }
                CHANNEL_TEXT if storage_channel.is_none() => {
                    let _: Channel = self
                        .http
                        .send_json(
                            Method::PATCH,
                            &format!("/channels/{}", channel.id),
                            &ModifyChannel {
                                name: &self.channel_name,
                            },
                        )
                        .await?;
                    storage_channel = Some(channel.id);
                }
                _ => {}
            }
        }

        let channel_id = match storage_channel {
            Some(id) => id,
            None => self.create_channel(&guild.id).await?,
        };

        Ok(Target {
            guild_id: guild.id,
            channel_id,
        })
    }

    async fn ensure_channel(&self, guild_id: &str) -> Result<Target, StorageError> {
        let channels = self.channels(guild_id).await?;
        let text: Vec<&Channel> = channels.iter().filter(|c| c.kind == CHANNEL_TEXT).collect();
        let existing = text
            .iter()
            .find(|c| c.name.as_deref() == Some(self.channel_name.as_str()))
            .or_else(|| text.first())
            .map(|c| c.id.clone());

        let channel_id = match existing {
            Some(id) => id,
            None => self.create_channel(guild_id).await?,
        };

        Ok(Target {
            guild_id: guild_id.to_string(),
            channel_id,
        })
    }

    async fn create_channel(&self, guild_id: &str) -> Result<String, StorageError> {
        let channel: Channel = self
            .http
            .send_json(
                Method::POST,
                &format!("/guilds/{guild_id}/channels"),
                &CreateChannel {
                    name: &self.channel_name,
                    kind: CHANNEL_TEXT,
                },
            )
            .await?;
        Ok(channel.id)
    }

    async fn channels(&self, guild_id: &str) -> Result<Vec<Channel>, StorageError> {
        self.http
            .get_json(&format!("/guilds/{guild_id}/channels"))
            .await
    }

    async fn purge(&self, guild_id: &str) -> Result<(), StorageError> {
        let mut removed = 0_u64;
        for channel in self.channels(guild_id).await? {
            if channel.kind != CHANNEL_TEXT {
                continue;
            }
            loop {
                let page: Vec<Message> = self
                    .http
                    .get_json(&format!(
                        "/channels/{}/messages?limit={PURGE_PAGE}",
                        channel.id
                    ))
                    .await?;
                if page.is_empty() {
                    break;
                }
                let mut progressed = false;
                for message in page {
                    match self
                        .http
                        .delete(&format!("/channels/{}/messages/{}", channel.id, message.id))
                        .await
                    {
                        Ok(()) => {
                            removed += 1;
                            progressed = true;
                        }
                        Err(StorageError::NotFound { .. }) => {}
                        Err(err) => return Err(err),
                    }
                }
                // A page of messages that cannot be deleted would be listed forever.
                if !progressed {
                    warn!(channel_id = %channel.id, "Purge stopped on undeletable messages");
                    break;
                }
            }
        }
        warn!(guild_id, removed, "Purged stored messages");
        Ok(())
    }

    async fn log_invite(&self, target: &Target) {
        let invite: Result<Invite, _> = self
            .http
            .send_json(
                Method::POST,
                &format!("/channels/{}/invites", target.channel_id),
                &CreateInvite { max_age: 0 },
            )
            .await;
        match invite {
            Ok(invite) => info!(url = %format!("https://discord.gg/{}", invite.code), "Storage container invite"),
            Err(err) => warn!(error = %err, "Failed to create invite"),
        }
    }

    async fn sync_metadata(&self, guild_id: &str) -> Result<(), StorageError> {
        let app: Application = self.http.get_json("/oauth2/applications/@me").await?;

        let icon = match &app.icon {
            Some(hash) => {
                let url = format!("{}/app-icons/{}/{hash}.png", self.cdn_base, app.id);
                let response = self.http.fetch(&url).await?;
                let bytes = self.http.read_bytes(response).await?;
                Some(format!("data:image/png;base64,{}", STANDARD.encode(&bytes)))
            }
            None => None,
        };

        let _: Guild = self
            .http
            .send_json(
                Method::PATCH,
                &format!("/guilds/{guild_id}"),
                &ModifyGuild {
                    name: &app.name,
                    icon,
                },
            )
            .await?;
        info!(guild_id, name = %app.name, "Synced container metadata");
        Ok(())
    }

    async fn evict_foreign(&self) -> Result<(), StorageError> {
        let guilds: Vec<PartialGuild> = self.http.get_json("/users/@me/guilds").await?;
        for guild in guilds.iter().filter(|g| !g.owner) {
            self.leave(guild).await?;
        }
        if let Some(target) = self.current_target()
            && !guilds.iter().any(|g| g.id == target.guild_id)
        {
            error!(guild_id = %target.guild_id, "Storage container is gone");
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for DiscordStorage {
    async fn open(&self) -> Result<(), StorageError> {
        self.readiness.set(AdapterState::Connecting);
        match self.connect().await {
            Ok(target) => {
                info!(
                    guild_id = %target.guild_id,
                    channel_id = %target.channel_id,
                    "Storage container ready"
                );
                self.set_target(Some(target));
                self.readiness.set(AdapterState::Ready);
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Failed to open storage");
                Err(err)
            }
        }
    }

    async fn close(&self) {
        self.readiness.set(AdapterState::Closed);
        self.set_target(None);
    }

    fn state(&self) -> AdapterState {
        self.readiness.get()
    }

    async fn reconcile(&self) -> Result<(), StorageError> {
        self.readiness.ensure_available()?;
        self.evict_foreign().await
    }

    async fn put_blob(
        &self,
        owner_id: &str,
        filename: &str,
        bytes: Bytes,
    ) -> Result<BlobReceipt, StorageError> {
        self.readiness.ensure_available()?;
        let target = self.current_target().ok_or(StorageError::NotReady)?;

        let payload = serde_json::to_string(&CreateMessage::upload(owner_id, filename))
            .map_err(|e| StorageError::decode(e.to_string()))?;
        let message: Message = self
            .http
            .post_file(
                &format!("/channels/{}/messages", target.channel_id),
                &payload,
                filename,
                &bytes,
            )
            .await
            .inspect_err(|err| {
                if outcome_unknown(err) {
                    error!(
                        channel_id = %target.channel_id,
                        owner_id,
                        filename,
                        error = %err,
                        "Upload outcome unknown, the message may exist without an index row"
                    );
                }
            })?;

        let attachment = message
            .attachments
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::decode("message carries no attachment"))?;

        Ok(BlobReceipt {
            attachment_id: attachment.id,
            message_id: message.id,
            channel_id: message.channel_id,
            guild_id: target.guild_id,
            safe_name: attachment.filename,
            size: attachment.size,
            width: attachment.width,
            height: attachment.height,
            upload_timestamp: message.timestamp,
        })
    }

    async fn delete_blob(&self, channel_id: &str, message_id: &str) -> Result<(), StorageError> {
        self.readiness.ensure_available()?;
        self.http
            .delete(&format!("/channels/{channel_id}/messages/{message_id}"))
            .await
    }

    async fn fetch_blob(
        &self,
        channel_id: &str,
        attachment_id: &str,
        safe_name: &str,
    ) -> Result<BlobContent, StorageError> {
        let url = format!(
            "{}/attachments/{}/{}/{}",
            self.cdn_base,
            utf8_percent_encode(channel_id, PATH_SEGMENT),
            utf8_percent_encode(attachment_id, PATH_SEGMENT),
            utf8_percent_encode(safe_name, PATH_SEGMENT),
        );
        let response = self.http.fetch(&url).await?;
        let headers = response.headers().clone();
        let bytes = self.http.read_bytes(response).await?;

        Ok(BlobContent {
            bytes,
            content_type: header(&headers, CONTENT_TYPE.as_str()),
            cache_control: header(&headers, CACHE_CONTROL.as_str()),
            etag: header(&headers, ETAG.as_str()),
            last_modified: header(&headers, LAST_MODIFIED.as_str()),
        })
    }
}

/// Whether a failed write may still have been applied remotely.
fn outcome_unknown(err: &StorageError) -> bool {
    match err {
        StorageError::Timeout | StorageError::Transport(_) => true,
        StorageError::Remote { status, .. } => *status >= 500,
        _ => false,
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
