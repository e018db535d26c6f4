//! Discord REST payloads. Only the fields we read are modelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Guild text channel.
pub const CHANNEL_TEXT: u8 = 0;
/// Guild voice channel.
pub const CHANNEL_VOICE: u8 = 2;
/// Guild category.
pub const CHANNEL_CATEGORY: u8 = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialGuild {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub size: u64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invite {
    pub code: String,
}

/// Body of a 429 response.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitBody {
    pub retry_after: f64,
    #[serde(default)]
    pub global: bool,
}

/// Body of any other error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CreateGuild<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ModifyGuild<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModifyChannel<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateChannel<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: u8,
}

#[derive(Debug, Serialize)]
pub struct CreateInvite {
    pub max_age: u32,
}

#[derive(Debug, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AttachmentSlot<'a> {
    pub id: u32,
    pub filename: &'a str,
}

/// `payload_json` part of a message upload.
#[derive(Debug, Serialize)]
pub struct CreateMessage<'a> {
    pub content: String,
    pub allowed_mentions: AllowedMentions,
    pub attachments: Vec<AttachmentSlot<'a>>,
}

impl<'a> CreateMessage<'a> {
    /// Single attachment message tagging its owner without pinging them.
    pub fn upload(owner_id: &str, filename: &'a str) -> Self {
        Self {
            content: format!("<@{owner_id}>"),
            allowed_mentions: AllowedMentions { parse: Vec::new() },
            attachments: vec![AttachmentSlot { id: 0, filename }],
        }
    }
}
