//! File domain types.

use chrono::{DateTime, Utc};
use debris_shared::types::TimeWindow;
use serde::{Deserialize, Serialize};

use super::naming::file_path;

/// Largest accepted upload, in bytes.
pub const MAX_FILE_SIZE: u64 = 8_000_000;

/// Longest accepted file name, in characters.
pub const MAX_NAME_LENGTH: usize = 63;

/// A stored file. Serializes with its relative `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "FileJson")]
pub struct File {
    /// Remote attachment id, primary key.
    pub attachment_id: String,
    /// Remote message carrying the attachment.
    pub message_id: String,
    /// Remote channel.
    pub channel_id: String,
    /// Remote container.
    pub guild_id: String,
    /// Uploader.
    pub owner_id: String,
    /// User-facing name.
    pub name: String,
    /// Name as sanitized by the backend, used to address the blob.
    pub safe_name: String,
    /// Uppercase extension derived from the name at upload time.
    pub extension: Option<String>,
    /// MIME type sniffed from content at upload time.
    pub mime: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Image width.
    pub width: Option<u32>,
    /// Image height.
    pub height: Option<u32>,
    /// Set by the backend when the blob was stored.
    pub upload_timestamp: DateTime<Utc>,
}

impl File {
    /// Path of this file relative to the service root.
    #[must_use]
    pub fn url(&self) -> String {
        file_path(&self.attachment_id, &self.name)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileJson {
    attachment_id: String,
    message_id: String,
    channel_id: String,
    guild_id: String,
    owner_id: String,
    name: String,
    safe_name: String,
    extension: Option<String>,
    mime: Option<String>,
    size: u64,
    width: Option<u32>,
    height: Option<u32>,
    url: String,
    upload_timestamp: DateTime<Utc>,
}

impl From<File> for FileJson {
    fn from(file: File) -> Self {
        let url = file.url();
        Self {
            attachment_id: file.attachment_id,
            message_id: file.message_id,
            channel_id: file.channel_id,
            guild_id: file.guild_id,
            owner_id: file.owner_id,
            name: file.name,
            safe_name: file.safe_name,
            extension: file.extension,
            mime: file.mime,
            size: file.size,
            width: file.width,
            height: file.height,
            url,
            upload_timestamp: file.upload_timestamp,
        }
    }
}

/// Listing parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilesQuery {
    /// Maximum number of files. `None` or zero returns no files.
    pub limit: Option<u64>,
    /// Exclusive timestamp bounds.
    pub window: TimeWindow,
}

/// One page of a user's files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListing {
    /// Newest first.
    pub files: Vec<File>,
    /// All files owned by the user.
    pub total_file_count: u64,
    /// Files strictly older than the last returned one.
    pub earlier_files_left: u64,
}

/// Fields of a file its owner may change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FilePatch {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
}
