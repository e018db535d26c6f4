//! Process-local blob store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::state::{AdapterState, Readiness};
use super::types::{BlobContent, BlobReceipt, sanitize_filename};
use super::{BlobStore, StorageError};

const CHANNEL_ID: &str = "100000000000000001";
const GUILD_ID: &str = "100000000000000000";
const FIRST_SNOWFLAKE: u64 = 200_000_000_000_000_000;

#[derive(Debug, Clone)]
struct StoredBlob {
    attachment_id: String,
    safe_name: String,
    bytes: Bytes,
}

#[derive(Debug, Default)]
struct Inner {
    /// message id → blob
    blobs: HashMap<String, StoredBlob>,
    last_timestamp: Option<DateTime<Utc>>,
}

/// In-memory [`BlobStore`] with Discord-shaped identifiers.
///
/// Upload timestamps are strictly increasing so that listings are
/// deterministic.
#[derive(Debug)]
pub struct MemoryStorage {
    readiness: Readiness,
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Create an empty store in `Connecting` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            readiness: Readiness::new(),
            next_id: AtomicU64::new(FIRST_SNOWFLAKE),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Create an empty store that is already `Ready`.
    #[must_use]
    pub fn ready() -> Self {
        let store = Self::new();
        store.readiness.set(AdapterState::Ready);
        store
    }

    /// Force a state, e.g. to simulate a rate limited backend.
    pub fn set_state(&self, state: AdapterState) {
        self.readiness.set(state);
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().blobs.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn snowflake(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

#[async_trait]
impl BlobStore for MemoryStorage {
    async fn open(&self) -> Result<(), StorageError> {
        self.readiness.set(AdapterState::Ready);
        Ok(())
    }

    async fn close(&self) {
        self.readiness.set(AdapterState::Closed);
    }

    fn state(&self) -> AdapterState {
        self.readiness.get()
    }

    async fn put_blob(
        &self,
        owner_id: &str,
        filename: &str,
        bytes: Bytes,
    ) -> Result<BlobReceipt, StorageError> {
        self.readiness.ensure_available()?;

        let message_id = self.snowflake();
        let attachment_id = self.snowflake();
        let safe_name = sanitize_filename(filename);
        let size = bytes.len() as u64;

        let mut inner = self.lock();
        let now = Utc::now();
        let upload_timestamp = match inner.last_timestamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        inner.last_timestamp = Some(upload_timestamp);
        inner.blobs.insert(
            message_id.clone(),
            StoredBlob {
                attachment_id: attachment_id.clone(),
                safe_name: safe_name.clone(),
                bytes,
            },
        );
        debug!(owner_id, message_id, attachment_id, size, "Stored blob in memory");

        Ok(BlobReceipt {
            attachment_id,
            message_id,
            channel_id: CHANNEL_ID.to_string(),
            guild_id: GUILD_ID.to_string(),
            safe_name,
            size,
            width: None,
            height: None,
            upload_timestamp,
        })
    }

    async fn delete_blob(&self, channel_id: &str, message_id: &str) -> Result<(), StorageError> {
        self.readiness.ensure_available()?;
        if channel_id != CHANNEL_ID {
            return Err(StorageError::not_found(format!("channel {channel_id}")));
        }
        self.lock()
            .blobs
            .remove(message_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(format!("message {message_id}")))
    }

    async fn fetch_blob(
        &self,
        channel_id: &str,
        attachment_id: &str,
        safe_name: &str,
    ) -> Result<BlobContent, StorageError> {
        let inner = self.lock();
        inner
            .blobs
            .values()
            .find(|blob| {
                channel_id == CHANNEL_ID
                    && blob.attachment_id == attachment_id
                    && blob.safe_name == safe_name
            })
            .map(|blob| {
                let content_type = infer::get(&blob.bytes).map(|kind| kind.mime_type().to_string());
                BlobContent::new(blob.bytes.clone(), content_type)
            })
            .ok_or_else(|| StorageError::not_found(format!("attachment {attachment_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_requires_ready() {
        let store = MemoryStorage::new();
        let err = store
            .put_blob("1", "a.txt", Bytes::from_static(b"a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotReady));

        store.open().await.unwrap();
        assert!(store.is_ready());
        assert!(store.put_blob("1", "a.txt", Bytes::from_static(b"a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_put_fetch_delete() {
        let store = MemoryStorage::ready();
        let receipt = store
            .put_blob("42", "hello world.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(receipt.safe_name, "hello_world.txt");
        assert_eq!(receipt.size, 5);

        let content = store
            .fetch_blob(&receipt.channel_id, &receipt.attachment_id, &receipt.safe_name)
            .await
            .unwrap();
        assert_eq!(&content.bytes[..], b"hello");

        store
            .delete_blob(&receipt.channel_id, &receipt.message_id)
            .await
            .unwrap();
        assert!(store.is_empty());

        let err = store
            .delete_blob(&receipt.channel_id, &receipt.message_id)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_timestamps_strictly_increase() {
        let store = MemoryStorage::ready();
        let mut previous = None;
        for i in 0..20 {
            let receipt = store
                .put_blob("1", &format!("{i}.bin"), Bytes::from_static(b"x"))
                .await
                .unwrap();
            if let Some(prev) = previous {
                assert!(receipt.upload_timestamp > prev);
            }
            previous = Some(receipt.upload_timestamp);
        }
    }

    #[tokio::test]
    async fn test_degraded_still_accepts_calls() {
        let store = MemoryStorage::ready();
        store.set_state(AdapterState::Degraded);
        assert!(!store.is_ready());
        assert!(store.put_blob("1", "a", Bytes::from_static(b"a")).await.is_ok());

        store.close().await;
        assert_eq!(store.state(), AdapterState::Closed);
        assert!(store.put_blob("1", "a", Bytes::from_static(b"a")).await.is_err());
    }
}
