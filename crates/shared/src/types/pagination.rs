//! Cursor pagination over upload timestamps.
//!
//! File listings are paged newest first. A client passes the timestamp of the
//! oldest item it has seen as the next `before` bound; both bounds are
//! exclusive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exclusive timestamp bounds for a listing or count query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Only items strictly older than this.
    pub before: Option<DateTime<Utc>>,
    /// Only items strictly newer than this.
    pub after: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Window with no bounds.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            before: None,
            after: None,
        }
    }

    /// Window containing everything strictly older than `ts`.
    #[must_use]
    pub const fn before(ts: DateTime<Utc>) -> Self {
        Self {
            before: Some(ts),
            after: None,
        }
    }

    /// Returns true if `ts` lies inside both bounds.
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.before.is_none_or(|b| ts < b) && self.after.is_none_or(|a| ts > a)
    }
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
