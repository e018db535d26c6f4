//! Readiness state machine of a storage adapter.
//!
//! ```text
//! Connecting ──open ok──▶ Ready ◀──success── Degraded
//!      ▲                    │                   ▲
//!      └──── open ──────────┤                   │
//!                           └──rate limit/net───┘
//!            any ──close──▶ Closed
//! ```

use tokio::sync::watch;
use tracing::info;

use super::error::StorageError;

/// Lifecycle state of the connection to the remote backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// Handshake or reconciliation still in progress.
    Connecting,
    /// Steady state.
    Ready,
    /// Usable, but the backend is rate limiting or flaky; calls back off.
    Degraded,
    /// Shut down; no further calls are accepted.
    Closed,
}

impl AdapterState {
    /// Lowercase name for logs and health output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
            Self::Closed => "closed",
        }
    }
}

/// Shared, observable readiness flag.
#[derive(Debug)]
pub struct Readiness {
    tx: watch::Sender<AdapterState>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    /// Starts in `Connecting`.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AdapterState::Connecting);
        Self { tx }
    }

    /// Current state.
    #[must_use]
    pub fn get(&self) -> AdapterState {
        *self.tx.borrow()
    }

    /// Moves to `next`, logging the transition if it changes anything.
    pub fn set(&self, next: AdapterState) {
        self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!(from = current.as_str(), to = next.as_str(), "Storage state changed");
            *current = next;
            true
        });
    }

    /// `Ready → Degraded`. Other states are left alone.
    pub fn mark_degraded(&self) {
        if self.get() == AdapterState::Ready {
            self.set(AdapterState::Degraded);
        }
    }

    /// `Degraded → Ready`. Other states are left alone.
    pub fn mark_recovered(&self) {
        if self.get() == AdapterState::Degraded {
            self.set(AdapterState::Ready);
        }
    }

    /// Fails with `NotReady` unless blob operations are currently accepted.
    pub fn ensure_available(&self) -> Result<(), StorageError> {
        match self.get() {
            AdapterState::Ready | AdapterState::Degraded => Ok(()),
            AdapterState::Connecting | AdapterState::Closed => Err(StorageError::NotReady),
        }
    }

    /// Receiver that observes every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AdapterState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_connecting_and_rejects_calls() {
        let readiness = Readiness::new();
        assert_eq!(readiness.get(), AdapterState::Connecting);
        assert!(matches!(
            readiness.ensure_available(),
            Err(StorageError::NotReady)
        ));
    }

    #[test]
    fn test_degraded_only_from_ready() {
        let readiness = Readiness::new();
        readiness.mark_degraded();
        assert_eq!(readiness.get(), AdapterState::Connecting);

        readiness.set(AdapterState::Ready);
        readiness.mark_degraded();
        assert_eq!(readiness.get(), AdapterState::Degraded);
        assert!(readiness.ensure_available().is_ok());

        readiness.mark_recovered();
        assert_eq!(readiness.get(), AdapterState::Ready);
    }

    #[test]
    fn test_closed_is_not_recovered() {
        let readiness = Readiness::new();
        readiness.set(AdapterState::Closed);
        readiness.mark_recovered();
        assert_eq!(readiness.get(), AdapterState::Closed);
        assert!(readiness.ensure_available().is_err());
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let readiness = Readiness::new();
        let mut rx = readiness.subscribe();

        readiness.set(AdapterState::Ready);
        rx.changed().await.expect("sender alive");
        assert_eq!(*rx.borrow(), AdapterState::Ready);
    }
}
