//! Remote blob storage.
//!
//! File bytes never touch local disk: they are posted as message attachments
//! to a text channel inside a guild the bot owns. Every backend implements
//! [`BlobStore`] and exposes its lifecycle through [`AdapterState`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   put / delete / fetch    ┌────────────────────────┐
//! │  FileService  │ ────────────────────────▶ │  dyn BlobStore         │
//! └───────────────┘                           ├────────────────────────┤
//!                                             │ DiscordStorage         │
//!                                             │   semaphore + timeout  │
//!                                             │   429 → Degraded       │
//!                                             │ MemoryStorage          │
//!                                             └────────────────────────┘
//! ```

mod config;
pub mod discord;
mod error;
mod memory;
mod retry;
mod state;
mod types;

use async_trait::async_trait;
use bytes::Bytes;

pub use config::{DebugOptions, StorageConfig, StorageProvider};
pub use discord::DiscordStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;
pub use retry::RetryPolicy;
pub use state::{AdapterState, Readiness};
pub use types::{BlobContent, BlobReceipt, sanitize_filename};

/// Remote blob backend.
///
/// `put_blob`/`delete_blob` fail with [`StorageError::NotReady`] while the
/// adapter is `Connecting` or `Closed`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Connect and reconcile remote state. Ends in `Ready` on success.
    async fn open(&self) -> Result<(), StorageError>;

    /// Stop accepting calls.
    async fn close(&self);

    /// Current lifecycle state.
    fn state(&self) -> AdapterState;

    /// `true` only in `Ready`.
    fn is_ready(&self) -> bool {
        self.state() == AdapterState::Ready
    }

    /// Re-apply the ownership policy to the remote side (leave foreign
    /// containers). No-op for backends without foreign state.
    async fn reconcile(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Store `bytes` under `filename`, tagged with the owner.
    async fn put_blob(
        &self,
        owner_id: &str,
        filename: &str,
        bytes: Bytes,
    ) -> Result<BlobReceipt, StorageError>;

    /// Remove the message carrying a blob.
    ///
    /// Returns [`StorageError::NotFound`] when it is already gone.
    async fn delete_blob(&self, channel_id: &str, message_id: &str) -> Result<(), StorageError>;

    /// Fetch blob bytes by their addressing triple.
    async fn fetch_blob(
        &self,
        channel_id: &str,
        attachment_id: &str,
        safe_name: &str,
    ) -> Result<BlobContent, StorageError>;
}

/// Build the backend selected by `config`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn from_config(config: StorageConfig) -> Result<std::sync::Arc<dyn BlobStore>, StorageError> {
    match config.provider {
        StorageProvider::Memory => Ok(std::sync::Arc::new(MemoryStorage::new())),
        StorageProvider::Discord { .. } => Ok(std::sync::Arc::new(DiscordStorage::new(config)?)),
    }
}
