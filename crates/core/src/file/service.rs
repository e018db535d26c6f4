//! File service implementation.
//!
//! Writes are two-step sagas over the blob store and the index:
//! upload is `put_blob → insert`, delete is `delete_blob → delete`. There is
//! no rollback; every step is logged with the remote ids so orphans in either
//! direction can be found and repaired.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use debris_shared::types::TimeWindow;
use tracing::{error, info, warn};

use super::error::FileError;
use super::naming::{extract_extension, validate_name};
use super::types::{File, FileListing, FilePatch, ListFilesQuery, MAX_FILE_SIZE};
use crate::storage::{BlobContent, BlobStore, StorageError};

/// Repository trait for file persistence.
///
/// This trait is implemented by the db crate to provide actual database operations.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Insert a new file record.
    async fn insert(&self, file: &File) -> Result<(), FileError>;

    /// Find a file by attachment id.
    async fn find_by_id(&self, attachment_id: &str) -> Result<Option<File>, FileError>;

    /// Files of `owner_id` inside `window`, newest first, at most `limit`.
    async fn list_by_owner(
        &self,
        owner_id: &str,
        limit: u64,
        window: TimeWindow,
    ) -> Result<Vec<File>, FileError>;

    /// Number of files of `owner_id` inside `window`.
    async fn count_by_owner(&self, owner_id: &str, window: TimeWindow) -> Result<u64, FileError>;

    /// Change the user-facing name.
    async fn update_name(&self, attachment_id: &str, name: &str) -> Result<(), FileError>;

    /// Delete a record. Returns whether a row was removed.
    async fn delete(&self, attachment_id: &str) -> Result<bool, FileError>;
}

/// File service orchestrating the blob store and the metadata index.
#[derive(Clone)]
pub struct FileService {
    storage: Arc<dyn BlobStore>,
    repo: Arc<dyn FileRepository>,
    public_base: Option<String>,
}

impl FileService {
    /// Create a new file service.
    #[must_use]
    pub fn new(storage: Arc<dyn BlobStore>, repo: Arc<dyn FileRepository>) -> Self {
        Self {
            storage,
            repo,
            public_base: None,
        }
    }

    /// Set `{protocol}://{fqdn}` used by [`Self::absolute_url`].
    #[must_use]
    pub fn with_public_base(mut self, base: Option<String>) -> Self {
        self.public_base = base;
        self
    }

    /// The blob store, for readiness reporting.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn BlobStore> {
        &self.storage
    }

    /// Upload a file on behalf of `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is empty or longer than 63 characters
    /// - The content exceeds 8,000,000 bytes
    /// - The blob store or the index fails
    pub async fn upload(&self, owner_id: &str, name: &str, bytes: Bytes) -> Result<File, FileError> {
        validate_name("file.originalname", name)?;
        let size = bytes.len() as u64;
        if size > MAX_FILE_SIZE {
            return Err(FileError::FileTooLarge {
                size,
                max: MAX_FILE_SIZE,
            });
        }

        let mime = infer::get(&bytes).map(|kind| kind.mime_type().to_string());

        let receipt = self
            .storage
            .put_blob(owner_id, name, bytes)
            .await
            .inspect_err(|err| error!(owner_id, error = %err, "Upload failed at blob write"))?;
        info!(
            owner_id,
            attachment_id = %receipt.attachment_id,
            channel_id = %receipt.channel_id,
            message_id = %receipt.message_id,
            "Blob stored"
        );

        let file = File {
            attachment_id: receipt.attachment_id,
            message_id: receipt.message_id,
            channel_id: receipt.channel_id,
            guild_id: receipt.guild_id,
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            safe_name: receipt.safe_name,
            extension: extract_extension(name),
            mime,
            size: receipt.size,
            width: receipt.width,
            height: receipt.height,
            upload_timestamp: receipt.upload_timestamp,
        };

        if let Err(err) = self.repo.insert(&file).await {
            error!(
                attachment_id = %file.attachment_id,
                channel_id = %file.channel_id,
                message_id = %file.message_id,
                error = %err,
                "Orphan blob: index insert failed"
            );
            return Err(err);
        }
        info!(attachment_id = %file.attachment_id, size = file.size, "File indexed");

        Ok(file)
    }

    /// Look up a file.
    ///
    /// A mismatching `expected_name` is reported as `NotFound`, exactly like
    /// an unknown id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden` or a repository error.
    pub async fn retrieve(
        &self,
        attachment_id: &str,
        expected_name: Option<&str>,
        requesting_user: Option<&str>,
    ) -> Result<File, FileError> {
        let file = self
            .repo
            .find_by_id(attachment_id)
            .await?
            .ok_or(FileError::NotFound)?;

        if expected_name.is_some_and(|name| name != file.name) {
            return Err(FileError::NotFound);
        }
        if requesting_user.is_some_and(|user| user != file.owner_id) {
            return Err(FileError::Forbidden);
        }
        Ok(file)
    }

    /// List files of `owner_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the index fails.
    pub async fn list(&self, owner_id: &str, query: ListFilesQuery) -> Result<FileListing, FileError> {
        let total_file_count = self
            .repo
            .count_by_owner(owner_id, TimeWindow::unbounded())
            .await?;

        let files = match query.limit {
            Some(limit) if limit > 0 => {
                self.repo
                    .list_by_owner(owner_id, limit, query.window)
                    .await?
            }
            _ => Vec::new(),
        };

        let earlier_files_left = match files.last() {
            Some(last) => {
                self.repo
                    .count_by_owner(owner_id, TimeWindow::before(last.upload_timestamp))
                    .await?
            }
            None => 0,
        };

        Ok(FileListing {
            files,
            total_file_count,
            earlier_files_left,
        })
    }

    /// Apply `patch` to a file owned by `requesting_user`.
    ///
    /// Only the name changes; extension and MIME stay as derived at upload.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden`, `InvalidName` or a repository error.
    pub async fn rename(
        &self,
        attachment_id: &str,
        expected_name: &str,
        requesting_user: &str,
        patch: FilePatch,
    ) -> Result<File, FileError> {
        let mut file = self
            .retrieve(attachment_id, Some(expected_name), Some(requesting_user))
            .await?;

        if let Some(name) = patch.name {
            validate_name("name", &name)?;
            self.repo.update_name(attachment_id, &name).await?;
            info!(attachment_id, old = %file.name, new = %name, "File renamed");
            file.name = name;
        }
        Ok(file)
    }

    /// Delete a file owned by `requesting_user`.
    ///
    /// The blob goes first: a crash in between leaves an index row without a
    /// blob, never an unreachable blob.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden`, a storage or a repository error.
    pub async fn delete(
        &self,
        attachment_id: &str,
        expected_name: &str,
        requesting_user: &str,
    ) -> Result<(), FileError> {
        let file = self
            .retrieve(attachment_id, Some(expected_name), Some(requesting_user))
            .await?;

        match self
            .storage
            .delete_blob(&file.channel_id, &file.message_id)
            .await
        {
            Ok(()) => info!(
                attachment_id,
                channel_id = %file.channel_id,
                message_id = %file.message_id,
                "Blob deleted"
            ),
            Err(StorageError::NotFound { .. }) => warn!(
                attachment_id,
                channel_id = %file.channel_id,
                message_id = %file.message_id,
                "Blob already gone"
            ),
            Err(err) => {
                error!(attachment_id, error = %err, "Delete failed at blob removal");
                return Err(err.into());
            }
        }

        if let Err(err) = self.repo.delete(attachment_id).await {
            error!(
                attachment_id,
                channel_id = %file.channel_id,
                message_id = %file.message_id,
                error = %err,
                "Dangling index row: blob removed but row delete failed"
            );
            return Err(err);
        }
        info!(attachment_id, "File deleted");
        Ok(())
    }

    /// Fetch the bytes of a file addressed by id and name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids, mismatching names or missing
    /// blobs, otherwise storage errors.
    pub async fn fetch_content(
        &self,
        attachment_id: &str,
        name: &str,
    ) -> Result<(File, BlobContent), FileError> {
        let file = self.retrieve(attachment_id, Some(name), None).await?;
        match self
            .storage
            .fetch_blob(&file.channel_id, &file.attachment_id, &file.safe_name)
            .await
        {
            Ok(content) => Ok((file, content)),
            Err(StorageError::NotFound { .. }) => {
                warn!(attachment_id, "Indexed file has no blob");
                Err(FileError::NotFound)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// `{protocol}://{fqdn}/files/{id}/{name}`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when no public domain is configured.
    pub fn absolute_url(&self, file: &File) -> Result<String, FileError> {
        let base = self
            .public_base
            .as_deref()
            .ok_or_else(|| FileError::Configuration("public.fqdn has not been set".to_string()))?;
        Ok(format!("{base}{}", file.url()))
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
