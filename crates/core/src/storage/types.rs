//! Values exchanged with a blob store.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Remote coordinates and metadata of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobReceipt {
    /// Attachment identifier, becomes the file id.
    pub attachment_id: String,
    /// Message carrying the attachment.
    pub message_id: String,
    /// Channel the message was posted in.
    pub channel_id: String,
    /// Container (guild) holding the channel.
    pub guild_id: String,
    /// Filename as sanitized by the backend.
    pub safe_name: String,
    /// Stored size in bytes.
    pub size: u64,
    /// Image width, when the backend could read one.
    pub width: Option<u32>,
    /// Image height, when the backend could read one.
    pub height: Option<u32>,
    /// Creation time reported by the backend.
    pub upload_timestamp: DateTime<Utc>,
}

/// Blob bytes with the HTTP metadata worth forwarding to clients.
#[derive(Debug, Clone)]
pub struct BlobContent {
    /// Body.
    pub bytes: Bytes,
    /// `Content-Type` reported by the backend.
    pub content_type: Option<String>,
    /// `Cache-Control`.
    pub cache_control: Option<String>,
    /// `ETag`.
    pub etag: Option<String>,
    /// `Last-Modified`.
    pub last_modified: Option<String>,
}

impl BlobContent {
    /// Content without any cache metadata.
    #[must_use]
    pub fn new(bytes: Bytes, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
            cache_control: None,
            etag: None,
            last_modified: None,
        }
    }
}

/// Replace characters the backend rewrites in attachment names.
///
/// Discord keeps ASCII letters, digits, `.`, `-` and `_`; anything else
/// becomes `_`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        "unknown".to_string()
    } else {
        safe
    }
}
