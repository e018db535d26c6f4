//! In-memory file index, for tests and the memory backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use debris_shared::types::TimeWindow;

use super::error::FileError;
use super::service::FileRepository;
use super::types::File;

/// [`FileRepository`] over a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryFileRepository {
    files: Mutex<HashMap<String, File>>,
}

impl InMemoryFileRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, File>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn insert(&self, file: &File) -> Result<(), FileError> {
        let mut files = self.lock();
        if files.contains_key(&file.attachment_id)
            || files.values().any(|f| f.message_id == file.message_id)
        {
            return Err(FileError::repository(format!(
                "duplicate file {}",
                file.attachment_id
            )));
        }
        files.insert(file.attachment_id.clone(), file.clone());
        Ok(())
    }

    async fn find_by_id(&self, attachment_id: &str) -> Result<Option<File>, FileError> {
        Ok(self.lock().get(attachment_id).cloned())
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        limit: u64,
        window: TimeWindow,
    ) -> Result<Vec<File>, FileError> {
        let mut owned: Vec<File> = self
            .lock()
            .values()
            .filter(|f| f.owner_id == owner_id && window.contains(f.upload_timestamp))
            .cloned()
            .collect();
        owned.sort_by(|a, b| {
            b.upload_timestamp
                .cmp(&a.upload_timestamp)
                .then_with(|| b.attachment_id.cmp(&a.attachment_id))
        });
        owned.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(owned)
    }

    async fn count_by_owner(&self, owner_id: &str, window: TimeWindow) -> Result<u64, FileError> {
        let count = self
            .lock()
            .values()
            .filter(|f| f.owner_id == owner_id && window.contains(f.upload_timestamp))
            .count();
        Ok(count as u64)
    }

    async fn update_name(&self, attachment_id: &str, name: &str) -> Result<(), FileError> {
        if let Some(file) = self.lock().get_mut(attachment_id) {
            file.name = name.to_string();
        }
        Ok(())
    }

    async fn delete(&self, attachment_id: &str) -> Result<bool, FileError> {
        Ok(self.lock().remove(attachment_id).is_some())
    }
}
