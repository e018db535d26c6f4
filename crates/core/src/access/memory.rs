//! In-memory access log, for tests and the memory backend.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::ledger::{AccessError, AccessRepository, NewAccess};

/// [`AccessRepository`] over a `Vec`, using the process clock.
#[derive(Debug, Default)]
pub struct InMemoryAccessRepository {
    rows: Mutex<Vec<(NewAccess, DateTime<Utc>)>>,
}

impl InMemoryAccessRepository {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rows, oldest first.
    #[must_use]
    pub fn rows(&self) -> Vec<NewAccess> {
        self.lock().iter().map(|(row, _)| row.clone()).collect()
    }

    /// Move every timestamp `by` into the past.
    pub fn shift_back(&self, by: Duration) {
        for (_, at) in self.lock().iter_mut() {
            *at -= by;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(NewAccess, DateTime<Utc>)>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AccessRepository for InMemoryAccessRepository {
    async fn recent_access_exists(&self, hash: &str, window_secs: u32) -> Result<bool, AccessError> {
        let since = Utc::now() - Duration::seconds(i64::from(window_secs));
        Ok(self
            .lock()
            .iter()
            .any(|(row, at)| row.hash == hash && *at >= since))
    }

    async fn insert_access(&self, access: &NewAccess) -> Result<(), AccessError> {
        self.lock().push((access.clone(), Utc::now()));
        Ok(())
    }
}
